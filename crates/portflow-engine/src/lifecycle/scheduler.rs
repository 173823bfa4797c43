//! Turn-based pass scheduling.
//!
//! Work is requested now and performed on a later turn. Requests for the same
//! node coalesce into one [`PendingSync`]; a turn drains every pending entry
//! in first-request order. Timers live on a virtual clock that only moves
//! through [`Scheduler::advance`].

use std::time::Duration;

use indexmap::IndexMap;
use smallvec::SmallVec;

use portflow_core::{NodeId, SlotSide};

use super::SyncReason;
use crate::normalize::Connectivity;

/// Coalesced work for one node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingSync {
    pub reasons: SmallVec<[SyncReason; 2]>,
    disconnects: Vec<(SlotSide, usize)>,
}

impl PendingSync {
    pub fn new(reason: SyncReason) -> Self {
        let mut pending = PendingSync::default();
        pending.add_reason(reason);
        pending
    }

    fn add_reason(&mut self, reason: SyncReason) {
        if !self.reasons.contains(&reason) {
            self.reasons.push(reason);
        }
    }

    /// Declared connectivity when any reason needs it.
    pub fn connectivity(&self) -> Connectivity {
        if self.reasons.iter().any(|r| r.connectivity() == Connectivity::Declared) {
            Connectivity::Declared
        } else {
            Connectivity::Live
        }
    }

    /// Gap checks to run before the pass, highest slot first so earlier
    /// removals never shift a later check.
    pub fn disconnect_checks(&self) -> Vec<(SlotSide, usize)> {
        let mut checks = self.disconnects.clone();
        checks.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then((a.0 == SlotSide::Output).cmp(&(b.0 == SlotSide::Output)))
        });
        checks.dedup_by_key(|(_, slot)| *slot);
        checks
    }

    /// First reason recorded.
    pub fn primary(&self) -> Option<SyncReason> {
        self.reasons.first().copied()
    }
}

#[derive(Debug, Clone)]
struct Timer {
    due: Duration,
    seq: u64,
    node: NodeId,
    reason: SyncReason,
}

/// Deferred pass queue plus timers.
#[derive(Debug, Default)]
pub struct Scheduler {
    pending: IndexMap<NodeId, PendingSync>,
    timers: Vec<Timer>,
    now: Duration,
    seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler::default()
    }

    /// Queues a pass for `node` on the next turn.
    pub fn request(&mut self, node: NodeId, reason: SyncReason) {
        self.pending.entry(node).or_default().add_reason(reason);
        tracing::trace!(node = %node, reason = %reason, "pass requested");
    }

    /// Queues a gap check for a disconnected slot, plus the pass after it.
    pub fn request_disconnect_check(&mut self, node: NodeId, side: SlotSide, slot: usize) {
        let entry = self.pending.entry(node).or_default();
        entry.add_reason(SyncReason::Disconnected);
        entry.disconnects.push((side, slot));
    }

    /// Queues a pass once the clock has moved `delay` past now.
    pub fn request_after(&mut self, node: NodeId, reason: SyncReason, delay: Duration) {
        self.seq += 1;
        self.timers.push(Timer {
            due: self.now + delay,
            seq: self.seq,
            node,
            reason,
        });
    }

    /// Takes every pending entry for one turn. Requests made while the turn
    /// runs land in the next one.
    pub fn take_turn(&mut self) -> Vec<(NodeId, PendingSync)> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }

    /// Moves the clock and queues the timers that came due, in due order.
    /// Returns how many fired.
    pub fn advance(&mut self, by: Duration) -> usize {
        self.now += by;
        let now = self.now;
        let (mut due, waiting): (Vec<Timer>, Vec<Timer>) =
            std::mem::take(&mut self.timers).into_iter().partition(|t| t.due <= now);
        self.timers = waiting;
        due.sort_by_key(|t| (t.due, t.seq));
        for timer in &due {
            self.request(timer.node, timer.reason);
        }
        due.len()
    }

    pub fn is_pending(&self, node: NodeId) -> bool {
        self.pending.contains_key(&node)
    }

    /// Whether a timer for `node` has not fired yet.
    pub fn has_timer(&self, node: NodeId) -> bool {
        self.timers.iter().any(|t| t.node == node)
    }

    /// No pending turn work. Timers may still be waiting.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    /// Drops all work for a removed node.
    pub fn forget(&mut self, node: NodeId) {
        self.pending.shift_remove(&node);
        self.timers.retain(|t| t.node != node);
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.timers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_coalesce_in_first_request_order() {
        let mut s = Scheduler::new();
        s.request(NodeId(2), SyncReason::Connected);
        s.request(NodeId(1), SyncReason::Added);
        s.request(NodeId(2), SyncReason::Connected);
        s.request(NodeId(2), SyncReason::BusChanged);
        let turn = s.take_turn();
        assert_eq!(turn.len(), 2);
        assert_eq!(turn[0].0, NodeId(2));
        assert_eq!(turn[0].1.reasons.as_slice(), &[SyncReason::Connected, SyncReason::BusChanged]);
        assert!(s.is_idle());
    }

    #[test]
    fn disconnect_checks_run_highest_slot_first() {
        let mut s = Scheduler::new();
        s.request_disconnect_check(NodeId(1), SlotSide::Input, 1);
        s.request_disconnect_check(NodeId(1), SlotSide::Input, 3);
        s.request_disconnect_check(NodeId(1), SlotSide::Output, 3);
        let (_, pending) = s.take_turn().remove(0);
        assert_eq!(pending.disconnect_checks(), vec![(SlotSide::Input, 3), (SlotSide::Input, 1)]);
        assert_eq!(pending.primary(), Some(SyncReason::Disconnected));
    }

    #[test]
    fn configure_reason_forces_declared_connectivity() {
        let mut pending = PendingSync::new(SyncReason::Added);
        assert_eq!(pending.connectivity(), Connectivity::Live);
        pending.add_reason(SyncReason::Configured);
        assert_eq!(pending.connectivity(), Connectivity::Declared);
    }

    #[test]
    fn timers_fire_when_due() {
        let mut s = Scheduler::new();
        s.request_after(NodeId(1), SyncReason::PostLoad, Duration::from_millis(100));
        s.request_after(NodeId(2), SyncReason::PostLoad, Duration::from_millis(50));
        assert_eq!(s.advance(Duration::from_millis(60)), 1);
        assert!(s.is_pending(NodeId(2)));
        assert!(!s.is_pending(NodeId(1)));
        assert!(s.has_timer(NodeId(1)));
        assert_eq!(s.advance(Duration::from_millis(40)), 1);
        assert_eq!(s.timer_count(), 0);
        assert_eq!(s.now(), Duration::from_millis(100));
    }

    #[test]
    fn forget_drops_pending_and_timers() {
        let mut s = Scheduler::new();
        s.request(NodeId(1), SyncReason::Added);
        s.request_after(NodeId(1), SyncReason::PostLoad, Duration::ZERO);
        s.forget(NodeId(1));
        assert!(s.is_idle());
        assert_eq!(s.advance(Duration::from_millis(1)), 0);
    }
}
