//! Bounded connection pool.
//!
//! The pool is the only mutable shared state in the core: a capacity-bounded
//! map of established links plus the single in-flight connect attempt. All
//! mutation goes through the operations here; the manager serializes calls
//! by holding one lock per transport event.
//!
//! Invariants maintained by construction:
//!
//! - `occupancy() <= capacity()` at all times;
//! - at most one attempt is in flight (`attempt` is an `Option`);
//! - every promoted link is released exactly once.

use std::collections::HashMap;

use tracing::debug;

use lifeline_types::{ConnHandle, LinkState, PeerAddress};

use crate::error::{Error, Result};

/// One established (or terminating) peripheral link.
#[derive(Debug, Clone)]
pub struct Link {
    handle: ConnHandle,
    address: PeerAddress,
    state: LinkState,
}

impl Link {
    /// The transport-assigned handle, the link's identity of record.
    #[must_use]
    pub fn handle(&self) -> ConnHandle {
        self.handle
    }

    /// The remote address, for logging and diagnostics only.
    #[must_use]
    pub fn address(&self) -> &PeerAddress {
        &self.address
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Whether the link still counts as a connected alarm recipient.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    fn transition(&mut self, next: LinkState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::invalid_transition(self.handle, self.state, next));
        }
        debug!(link = %self.handle, from = %self.state, to = %next, "link transition");
        self.state = next;
        Ok(())
    }
}

/// The single in-flight connection attempt.
///
/// There is no handle yet; the attempt is correlated with its
/// `ConnectResult` purely by the one-at-a-time admission discipline.
#[derive(Debug, Clone)]
pub struct ConnectAttempt {
    address: PeerAddress,
}

impl ConnectAttempt {
    /// The candidate being connected to.
    #[must_use]
    pub fn address(&self) -> &PeerAddress {
        &self.address
    }
}

/// Capacity-bounded collection of links.
///
/// Created once at startup and mutated only through the explicit
/// operations below, under the manager's lock.
#[derive(Debug)]
pub struct ConnectionPool {
    capacity: usize,
    links: HashMap<ConnHandle, Link>,
    attempt: Option<ConnectAttempt>,
}

impl ConnectionPool {
    /// Create an empty pool with the given fixed capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            links: HashMap::with_capacity(capacity),
            attempt: None,
        }
    }

    /// Maximum simultaneous links.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently held (links `Connected` or `Disconnecting`).
    ///
    /// The in-flight attempt is not counted: its slot is only claimed when
    /// the attempt is promoted.
    #[must_use]
    pub fn occupancy(&self) -> usize {
        self.links.len()
    }

    /// Whether every slot is taken.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.occupancy() >= self.capacity
    }

    /// Whether a connect attempt is in flight.
    #[must_use]
    pub fn has_attempt(&self) -> bool {
        self.attempt.is_some()
    }

    /// Address of the in-flight attempt, if any.
    #[must_use]
    pub fn attempt_address(&self) -> Option<&PeerAddress> {
        self.attempt.as_ref().map(ConnectAttempt::address)
    }

    /// Look up a link by handle.
    #[must_use]
    pub fn get(&self, handle: ConnHandle) -> Option<&Link> {
        self.links.get(&handle)
    }

    /// Handles of every link currently in `Connected` state.
    #[must_use]
    pub fn connected_handles(&self) -> Vec<ConnHandle> {
        let mut handles: Vec<ConnHandle> = self
            .links
            .values()
            .filter(|l| l.is_connected())
            .map(Link::handle)
            .collect();
        handles.sort_unstable();
        handles
    }

    /// Reserve the single attempt slot for `address`.
    ///
    /// Fails with [`Error::AlreadyConnecting`] if another attempt is in
    /// flight. Callers must have checked `is_full()` first; a full pool is
    /// an admission decision, not an error.
    pub fn try_begin_connect(&mut self, address: PeerAddress) -> Result<()> {
        if self.attempt.is_some() {
            return Err(Error::AlreadyConnecting { candidate: address });
        }
        debug_assert!(!self.is_full(), "admission past a full pool");
        debug!(candidate = %address, "attempt slot reserved");
        self.attempt = Some(ConnectAttempt { address });
        Ok(())
    }

    /// Promote the in-flight attempt to an established link under `handle`.
    ///
    /// Fails with [`Error::InvalidTransition`] if no attempt is in flight
    /// or the handle is already pooled; in both cases nothing is mutated.
    pub fn promote_to_connected(&mut self, handle: ConnHandle) -> Result<&Link> {
        if self.links.contains_key(&handle) {
            let from = self.links[&handle].state();
            return Err(Error::invalid_transition(handle, from, LinkState::Connected));
        }
        let attempt = self
            .attempt
            .take()
            .ok_or_else(|| Error::invalid_transition(handle, LinkState::Released, LinkState::Connected))?;

        let link = Link {
            handle,
            address: attempt.address,
            state: LinkState::Connected,
        };
        debug!(link = %handle, address = %link.address, occupancy = self.links.len() + 1, "link promoted");
        Ok(self.links.entry(handle).or_insert(link))
    }

    /// Clear a failed in-flight attempt (the `Connecting -> Released` edge).
    ///
    /// Occupancy is untouched: the slot was never counted. Returns the
    /// candidate address for logging.
    pub fn abort_attempt(&mut self) -> Result<PeerAddress> {
        let attempt = self.attempt.take().ok_or_else(|| {
            // No attempt to abort: contract violation on the caller's side.
            Error::invalid_transition(ConnHandle(0), LinkState::Released, LinkState::Released)
        })?;
        debug!(candidate = %attempt.address, "attempt aborted");
        Ok(attempt.address)
    }

    /// Mark a link as terminating at this side's request.
    ///
    /// The slot stays held until the transport reports the disconnection.
    pub fn begin_disconnect(&mut self, handle: ConnHandle) -> Result<()> {
        let link = self
            .links
            .get_mut(&handle)
            .ok_or(Error::UnknownLink(handle))?;
        link.transition(LinkState::Disconnecting)
    }

    /// Release a link's slot, returning the link in `Released` state.
    ///
    /// Valid from `Connected` (spontaneous loss) and `Disconnecting`
    /// (manager-initiated); the freed slot is immediately reusable.
    pub fn release(&mut self, handle: ConnHandle) -> Result<Link> {
        let mut link = self
            .links
            .remove(&handle)
            .ok_or(Error::UnknownLink(handle))?;
        if let Err(e) = link.transition(LinkState::Released) {
            // Roll the entry back; the event that triggered us is bogus.
            self.links.insert(handle, link);
            return Err(e);
        }
        debug!(link = %handle, occupancy = self.links.len(), "slot released");
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> PeerAddress {
        PeerAddress::new(s)
    }

    #[test]
    fn test_empty_pool() {
        let pool = ConnectionPool::new(3);
        assert_eq!(pool.capacity(), 3);
        assert_eq!(pool.occupancy(), 0);
        assert!(!pool.is_full());
        assert!(!pool.has_attempt());
        assert!(pool.connected_handles().is_empty());
    }

    #[test]
    fn test_begin_promote_release_cycle() {
        let mut pool = ConnectionPool::new(3);

        pool.try_begin_connect(addr("P1")).unwrap();
        assert!(pool.has_attempt());
        assert_eq!(pool.attempt_address().unwrap().as_str(), "P1");
        assert_eq!(pool.occupancy(), 0);

        let link = pool.promote_to_connected(ConnHandle(1)).unwrap();
        assert_eq!(link.state(), LinkState::Connected);
        assert_eq!(link.address().as_str(), "P1");
        assert!(!pool.has_attempt());
        assert_eq!(pool.occupancy(), 1);

        let released = pool.release(ConnHandle(1)).unwrap();
        assert_eq!(released.state(), LinkState::Released);
        assert_eq!(pool.occupancy(), 0);
    }

    #[test]
    fn test_second_attempt_rejected() {
        let mut pool = ConnectionPool::new(3);
        pool.try_begin_connect(addr("P1")).unwrap();

        let err = pool.try_begin_connect(addr("P2")).unwrap_err();
        assert!(matches!(err, Error::AlreadyConnecting { .. }));
        // The original attempt is untouched.
        assert_eq!(pool.attempt_address().unwrap().as_str(), "P1");
    }

    #[test]
    fn test_abort_attempt_leaves_occupancy() {
        let mut pool = ConnectionPool::new(3);
        pool.try_begin_connect(addr("P1")).unwrap();
        pool.promote_to_connected(ConnHandle(1)).unwrap();

        pool.try_begin_connect(addr("P2")).unwrap();
        let candidate = pool.abort_attempt().unwrap();
        assert_eq!(candidate.as_str(), "P2");
        assert!(!pool.has_attempt());
        assert_eq!(pool.occupancy(), 1);
    }

    #[test]
    fn test_abort_without_attempt_is_contract_violation() {
        let mut pool = ConnectionPool::new(3);
        assert!(pool.abort_attempt().is_err());
    }

    #[test]
    fn test_promote_without_attempt_rejected() {
        let mut pool = ConnectionPool::new(3);
        let err = pool.promote_to_connected(ConnHandle(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(pool.occupancy(), 0);
    }

    #[test]
    fn test_promote_duplicate_handle_rejected() {
        let mut pool = ConnectionPool::new(3);
        pool.try_begin_connect(addr("P1")).unwrap();
        pool.promote_to_connected(ConnHandle(1)).unwrap();

        pool.try_begin_connect(addr("P2")).unwrap();
        let err = pool.promote_to_connected(ConnHandle(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        // Attempt survives; the bogus result was discarded.
        assert!(pool.has_attempt());
        assert_eq!(pool.occupancy(), 1);
    }

    #[test]
    fn test_release_unknown_handle() {
        let mut pool = ConnectionPool::new(3);
        let err = pool.release(ConnHandle(42)).unwrap_err();
        assert!(matches!(err, Error::UnknownLink(_)));
    }

    #[test]
    fn test_double_release_rejected() {
        let mut pool = ConnectionPool::new(3);
        pool.try_begin_connect(addr("P1")).unwrap();
        pool.promote_to_connected(ConnHandle(1)).unwrap();

        pool.release(ConnHandle(1)).unwrap();
        assert!(matches!(
            pool.release(ConnHandle(1)),
            Err(Error::UnknownLink(_))
        ));
    }

    #[test]
    fn test_disconnecting_link_keeps_slot_until_released() {
        let mut pool = ConnectionPool::new(1);
        pool.try_begin_connect(addr("P1")).unwrap();
        pool.promote_to_connected(ConnHandle(1)).unwrap();

        pool.begin_disconnect(ConnHandle(1)).unwrap();
        assert_eq!(pool.get(ConnHandle(1)).unwrap().state(), LinkState::Disconnecting);
        assert_eq!(pool.occupancy(), 1);
        assert!(pool.is_full());
        // Not an alarm recipient any more.
        assert!(pool.connected_handles().is_empty());

        pool.release(ConnHandle(1)).unwrap();
        assert_eq!(pool.occupancy(), 0);
    }

    #[test]
    fn test_double_begin_disconnect_rejected() {
        let mut pool = ConnectionPool::new(1);
        pool.try_begin_connect(addr("P1")).unwrap();
        pool.promote_to_connected(ConnHandle(1)).unwrap();
        pool.begin_disconnect(ConnHandle(1)).unwrap();

        let err = pool.begin_disconnect(ConnHandle(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[test]
    fn test_connected_handles_sorted_and_filtered() {
        let mut pool = ConnectionPool::new(3);
        for (i, name) in ["P1", "P2", "P3"].iter().enumerate() {
            pool.try_begin_connect(addr(name)).unwrap();
            pool.promote_to_connected(ConnHandle(i as u32 + 1)).unwrap();
        }
        pool.begin_disconnect(ConnHandle(2)).unwrap();

        assert_eq!(pool.connected_handles(), vec![ConnHandle(1), ConnHandle(3)]);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Begin(u8),
            Promote(u32),
            Abort,
            Release(u32),
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u8..10).prop_map(Op::Begin),
                (0u32..6).prop_map(Op::Promote),
                Just(Op::Abort),
                (0u32..6).prop_map(Op::Release),
            ]
        }

        proptest! {
            // Pool invariants hold under arbitrary (mostly invalid)
            // operation interleavings: the pool rejects what it must and
            // never oversubscribes.
            #[test]
            fn pool_invariants_hold(ops in proptest::collection::vec(op_strategy(), 0..64)) {
                let capacity = 3;
                let mut pool = ConnectionPool::new(capacity);
                let mut live = 0usize;

                for op in ops {
                    match op {
                        Op::Begin(n) => {
                            if !pool.is_full() {
                                let was_free = !pool.has_attempt();
                                let res = pool.try_begin_connect(addr(&format!("P{n}")));
                                prop_assert_eq!(res.is_ok(), was_free);
                            }
                        }
                        Op::Promote(h) => {
                            if pool.promote_to_connected(ConnHandle(h)).is_ok() {
                                live += 1;
                            }
                        }
                        Op::Abort => {
                            let _ = pool.abort_attempt();
                        }
                        Op::Release(h) => {
                            if pool.release(ConnHandle(h)).is_ok() {
                                live -= 1;
                            }
                        }
                    }

                    prop_assert!(pool.occupancy() <= pool.capacity());
                    prop_assert_eq!(pool.occupancy(), live);
                    // `attempt` is an Option, so "at most one in flight"
                    // reduces to the admission check above.
                }
            }
        }
    }
}
