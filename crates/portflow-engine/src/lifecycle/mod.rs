//! Per-node lifecycle state and the load session token.
//!
//! A dynamic node moves `Idle -> Scheduled -> Running -> Idle`. While it is
//! running, its `syncing` guard is set and structural events the pass itself
//! produces on the node are dropped.
//!
//! Bulk loading is signalled through a [`LoadSession`]: the editor opens one
//! for the duration of a load and hands its [`HookContext`] to every hook.
//! There is no process-wide flag; the session ends when it is dropped, on
//! success or failure.

pub mod scheduler;

use std::fmt;

use portflow_core::NodeId;

use crate::normalize::Connectivity;

pub use scheduler::{PendingSync, Scheduler};

/// Why a synchronize pass was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncReason {
    /// The node was added to the graph.
    Added,
    /// The node was configured from a saved snapshot.
    Configured,
    /// The delayed pass after a load.
    PostLoad,
    /// A link was attached to one of the node's slots.
    Connected,
    /// A link was removed from one of the node's slots.
    Disconnected,
    /// The upstream bus published a different channel map.
    BusChanged,
    /// An engine setting the node depends on changed.
    SettingsChanged,
    /// Explicitly requested by the host.
    Requested,
}

impl SyncReason {
    /// Connectivity a pass for this reason judges slots by.
    pub fn connectivity(self) -> Connectivity {
        match self {
            SyncReason::Configured => Connectivity::Declared,
            _ => Connectivity::Live,
        }
    }
}

impl fmt::Display for SyncReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncReason::Added => "added",
            SyncReason::Configured => "configured",
            SyncReason::PostLoad => "post-load",
            SyncReason::Connected => "connected",
            SyncReason::Disconnected => "disconnected",
            SyncReason::BusChanged => "bus-changed",
            SyncReason::SettingsChanged => "settings-changed",
            SyncReason::Requested => "requested",
        };
        f.write_str(name)
    }
}

/// Scheduling phase of a dynamic node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePhase {
    Idle,
    Scheduled,
    Running,
}

/// Lifecycle bookkeeping for one dynamic node.
#[derive(Debug, Clone, Default)]
pub struct NodeLifecycle {
    /// Set for the duration of a pass.
    pub syncing: bool,
    /// Completed passes.
    pub passes: u64,
    pub last_reason: Option<SyncReason>,
}

/// Ambient state handed to every hook invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookContext {
    loading: bool,
}

impl HookContext {
    /// Context for ordinary interactive edits.
    pub fn idle() -> Self {
        HookContext { loading: false }
    }

    /// Whether a bulk load is in progress.
    pub fn is_loading(&self) -> bool {
        self.loading
    }
}

/// Token proving a bulk load is in progress. Only the editor opens one.
#[derive(Debug)]
pub struct LoadSession {
    nodes: usize,
}

impl LoadSession {
    pub(crate) fn begin(nodes: usize) -> Self {
        tracing::debug!(nodes, "load session started");
        LoadSession { nodes }
    }

    pub fn context(&self) -> HookContext {
        HookContext { loading: true }
    }
}

impl Drop for LoadSession {
    fn drop(&mut self) {
        tracing::debug!(nodes = self.nodes, "load session ended");
    }
}

/// Derives a node's phase from its guard and the scheduler.
pub fn phase_of(lifecycle: &NodeLifecycle, scheduler: &Scheduler, node: NodeId) -> NodePhase {
    if lifecycle.syncing {
        NodePhase::Running
    } else if scheduler.is_pending(node) || scheduler.has_timer(node) {
        NodePhase::Scheduled
    } else {
        NodePhase::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_configure_uses_declared_connectivity() {
        assert_eq!(SyncReason::Configured.connectivity(), Connectivity::Declared);
        assert_eq!(SyncReason::PostLoad.connectivity(), Connectivity::Live);
        assert_eq!(SyncReason::Connected.connectivity(), Connectivity::Live);
    }

    #[test]
    fn session_context_is_loading() {
        assert!(!HookContext::idle().is_loading());
        let session = LoadSession::begin(3);
        assert!(session.context().is_loading());
    }

    #[test]
    fn phase_follows_guard_and_queue() {
        let mut scheduler = Scheduler::new();
        let mut lifecycle = NodeLifecycle::default();
        let node = NodeId(1);
        assert_eq!(phase_of(&lifecycle, &scheduler, node), NodePhase::Idle);
        scheduler.request(node, SyncReason::Added);
        assert_eq!(phase_of(&lifecycle, &scheduler, node), NodePhase::Scheduled);
        lifecycle.syncing = true;
        assert_eq!(phase_of(&lifecycle, &scheduler, node), NodePhase::Running);
    }
}
