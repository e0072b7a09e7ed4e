//! Error types for raw-byte decoding in lifeline-types.

use thiserror::Error;

/// Errors that can occur when decoding raw wire values.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in lifeline-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Advertisement type byte is outside the known GAP range.
    #[error("unknown advertisement kind: 0x{0:02X}")]
    UnknownAdvertisementKind(u8),
}

/// Result type alias using lifeline-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
