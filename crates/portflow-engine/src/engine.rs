//! Engine state and the synchronize pass.
//!
//! The [`Engine`] owns the per-node dynamic state and lifecycle records and
//! knows how to run one pass over one node. It never decides *when* a pass
//! runs; that is the scheduler's and the editor's business.

use std::collections::HashMap;

use portflow_core::{ConnectionChange, CoreError, HostGraph, NodeId};

use crate::error::EngineError;
use crate::kinds::{DynamicKind, DynamicNode, PassContext};
use crate::lifecycle::{HookContext, NodeLifecycle, PendingSync};
use crate::settings::EngineSettings;

/// What a pass produced besides its in-place edits.
#[derive(Debug, Default)]
pub struct PassOutcome {
    /// Structural changes to deliver to the affected nodes.
    pub changes: Vec<ConnectionChange>,
    /// Nodes that must re-synchronize because of this pass.
    pub notify: Vec<NodeId>,
}

#[derive(Debug)]
struct Entry {
    kind: DynamicKind,
    state: DynamicNode,
    lifecycle: NodeLifecycle,
}

pub struct Engine {
    settings: EngineSettings,
    nodes: HashMap<NodeId, Entry>,
}

impl Engine {
    pub fn new(settings: EngineSettings) -> Self {
        Engine {
            settings,
            nodes: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut EngineSettings {
        &mut self.settings
    }

    // -----------------------------------------------------------------------
    // Attachment
    // -----------------------------------------------------------------------

    /// Gives `node` dynamic state of `kind`. Re-attaching with the same kind
    /// keeps the existing state.
    pub fn attach(&mut self, node: NodeId, kind: &DynamicKind) {
        match self.nodes.get(&node) {
            Some(entry) if entry.kind == *kind => {}
            _ => {
                self.nodes.insert(
                    node,
                    Entry {
                        kind: kind.clone(),
                        state: kind.instantiate(),
                        lifecycle: NodeLifecycle::default(),
                    },
                );
            }
        }
    }

    pub fn detach(&mut self, node: NodeId) -> bool {
        self.nodes.remove(&node).is_some()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn is_dynamic(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn kind(&self, node: NodeId) -> Option<&DynamicKind> {
        self.nodes.get(&node).map(|e| &e.kind)
    }

    pub fn state(&self, node: NodeId) -> Option<&DynamicNode> {
        self.nodes.get(&node).map(|e| &e.state)
    }

    pub fn state_mut(&mut self, node: NodeId) -> Option<&mut DynamicNode> {
        self.nodes.get_mut(&node).map(|e| &mut e.state)
    }

    pub fn lifecycle(&self, node: NodeId) -> Option<&NodeLifecycle> {
        self.nodes.get(&node).map(|e| &e.lifecycle)
    }

    pub fn is_syncing(&self, node: NodeId) -> bool {
        self.nodes.get(&node).is_some_and(|e| e.lifecycle.syncing)
    }

    pub fn is_bus(&self, node: NodeId) -> bool {
        self.kind(node).is_some_and(DynamicKind::is_bus)
    }

    // -----------------------------------------------------------------------
    // Passes
    // -----------------------------------------------------------------------

    pub fn begin_pass(&mut self, node: NodeId) {
        if let Some(entry) = self.nodes.get_mut(&node) {
            entry.lifecycle.syncing = true;
        }
    }

    pub fn end_pass(&mut self, node: NodeId) {
        if let Some(entry) = self.nodes.get_mut(&node) {
            entry.lifecycle.syncing = false;
        }
    }

    /// Pre-seeds a fresh connection on `change.node` before its deferred pass.
    pub fn preseed(&mut self, graph: &mut HostGraph, change: &ConnectionChange) -> Result<(), EngineError> {
        let entry = self
            .nodes
            .get_mut(&change.node)
            .ok_or(EngineError::NotDynamic { node: change.node })?;
        entry.state.behavior_mut().preseed(graph, &self.settings, change)
    }

    /// Runs one full pass over `node`: gap checks, normalize, resolve,
    /// labels, finish, resize.
    ///
    /// A node that has left the graph is skipped silently.
    pub fn synchronize(
        &mut self,
        graph: &mut HostGraph,
        node: NodeId,
        pending: &PendingSync,
        context: HookContext,
    ) -> Result<PassOutcome, EngineError> {
        let entry = self
            .nodes
            .get_mut(&node)
            .ok_or(EngineError::NotDynamic { node })?;
        if graph.node(node).is_none() {
            tracing::trace!(node = %node, "skipping pass for removed node");
            return Ok(PassOutcome::default());
        }

        let mut changes = Vec::new();
        let behavior = entry.state.behavior_mut();
        let mut cx = PassContext {
            graph,
            node,
            settings: &self.settings,
            connectivity: pending.connectivity(),
            loading: context.is_loading(),
            changes: &mut changes,
        };

        for (side, slot) in pending.disconnect_checks() {
            behavior.compact_gap(&mut cx, side, slot)?;
        }
        behavior.normalize(&mut cx)?;
        let types = behavior.resolve_types(&mut cx)?;
        behavior.assign_labels(&mut cx, &types)?;
        let notify = behavior.finish(&mut cx)?;

        let grow_only = cx.loading || behavior.grow_only();
        resize(cx.graph, node, grow_only)?;

        entry.lifecycle.passes += 1;
        entry.lifecycle.last_reason = pending.primary();
        tracing::debug!(
            node = %node,
            reason = ?pending.primary(),
            connectivity = ?pending.connectivity(),
            "synchronized"
        );
        Ok(PassOutcome { changes, notify })
    }
}

/// Applies the node's computed size; with `grow_only` it never shrinks.
fn resize(graph: &mut HostGraph, node: NodeId, grow_only: bool) -> Result<(), EngineError> {
    let n = graph
        .node_mut(node)
        .ok_or(EngineError::Core(CoreError::NodeNotFound { id: node }))?;
    let wanted = n.compute_size();
    n.size = if grow_only {
        [n.size[0].max(wanted[0]), n.size[1].max(wanted[1])]
    } else {
        wanted
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::SyncReason;
    use portflow_core::SlotType;

    fn engine_with_passthrough() -> (Engine, HostGraph, NodeId) {
        let mut graph = HostGraph::new();
        let node = graph.add_node("PT_DynamicPassthrough");
        graph.add_input(node, "input", SlotType::Any).unwrap();
        graph.add_output(node, "output", SlotType::Any).unwrap();
        let mut engine = Engine::new(EngineSettings::default());
        engine.attach(node, &DynamicKind::Passthrough);
        (engine, graph, node)
    }

    #[test]
    fn pass_counts_and_records_reason() {
        let (mut engine, mut graph, node) = engine_with_passthrough();
        let pending = PendingSync::new(SyncReason::Requested);
        engine.synchronize(&mut graph, node, &pending, HookContext::idle()).unwrap();
        let lifecycle = engine.lifecycle(node).unwrap();
        assert_eq!(lifecycle.passes, 1);
        assert_eq!(lifecycle.last_reason, Some(SyncReason::Requested));
        assert!(graph.node(node).unwrap().size[1] > 0.0);
    }

    #[test]
    fn unknown_node_is_not_dynamic() {
        let (mut engine, mut graph, _) = engine_with_passthrough();
        let err = engine
            .synchronize(&mut graph, NodeId(42), &PendingSync::default(), HookContext::idle())
            .unwrap_err();
        assert!(matches!(err, EngineError::NotDynamic { .. }));
    }

    #[test]
    fn removed_node_is_skipped() {
        let (mut engine, mut graph, node) = engine_with_passthrough();
        graph.remove_node(node).unwrap();
        let outcome = engine
            .synchronize(&mut graph, node, &PendingSync::default(), HookContext::idle())
            .unwrap();
        assert!(outcome.changes.is_empty());
    }

    #[test]
    fn loading_never_shrinks() {
        let (mut engine, mut graph, node) = engine_with_passthrough();
        graph.node_mut(node).unwrap().size = [500.0, 500.0];
        let pending = PendingSync::new(SyncReason::Configured);
        let session = crate::lifecycle::LoadSession::begin(1);
        engine.synchronize(&mut graph, node, &pending, session.context()).unwrap();
        assert_eq!(graph.node(node).unwrap().size, [500.0, 500.0]);
        engine.synchronize(&mut graph, node, &pending, HookContext::idle()).unwrap();
        assert!(graph.node(node).unwrap().size[0] < 500.0);
    }

    #[test]
    fn reattach_same_kind_keeps_state() {
        let (mut engine, _, node) = engine_with_passthrough();
        engine.begin_pass(node);
        engine.attach(node, &DynamicKind::Passthrough);
        assert!(engine.is_syncing(node));
        engine.attach(node, &DynamicKind::Bus);
        assert!(!engine.is_syncing(node));
        assert!(engine.is_bus(node));
    }
}
