//! Structural event hooks.
//!
//! The host calls into a [`HookRegistry`] when a node is added, configured
//! from a snapshot, or has a connection change. Each class type maps to an
//! ordered list of handlers; every dynamic kind registers one
//! [`DynamicHooks`] for each class type it serves. Handlers decide between
//! running work now and deferring it through the scheduler.

use std::rc::Rc;

use indexmap::IndexMap;

use portflow_core::{ConnectionChange, HostGraph, NodeId};

use crate::engine::Engine;
use crate::kinds::DynamicKind;
use crate::lifecycle::{HookContext, Scheduler, SyncReason};

/// Everything a hook may touch.
pub struct HookCx<'a> {
    pub graph: &'a mut HostGraph,
    pub engine: &'a mut Engine,
    pub scheduler: &'a mut Scheduler,
    pub context: HookContext,
    /// Passes the editor must run as soon as the hooks return.
    pub immediate: &'a mut Vec<(NodeId, SyncReason)>,
}

/// Handlers for one node type's structural events.
pub trait NodeHooks {
    fn on_added(&self, _cx: &mut HookCx<'_>, _node: NodeId) {}

    fn on_configure(&self, _cx: &mut HookCx<'_>, _node: NodeId) {}

    fn on_connections_change(&self, _cx: &mut HookCx<'_>, _change: &ConnectionChange) {}
}

/// Ordered hook lists keyed by class type.
#[derive(Default)]
pub struct HookRegistry {
    hooks: IndexMap<String, Vec<Rc<dyn NodeHooks>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        HookRegistry::default()
    }

    /// Appends `hooks` to the handlers of `class_type`.
    pub fn register(&mut self, class_type: &str, hooks: Rc<dyn NodeHooks>) {
        self.hooks.entry(class_type.to_string()).or_default().push(hooks);
    }

    /// Handlers of `class_type`, in registration order.
    pub fn hooks_for(&self, class_type: &str) -> &[Rc<dyn NodeHooks>] {
        self.hooks.get(class_type).map_or(&[], Vec::as_slice)
    }

    pub fn is_registered(&self, class_type: &str) -> bool {
        self.hooks.contains_key(class_type)
    }
}

/// The handler every dynamic kind installs.
#[derive(Debug, Clone)]
pub struct DynamicHooks {
    kind: DynamicKind,
}

impl DynamicHooks {
    pub fn new(kind: DynamicKind) -> Self {
        DynamicHooks { kind }
    }

    pub fn kind(&self) -> &DynamicKind {
        &self.kind
    }
}

impl NodeHooks for DynamicHooks {
    /// One pass right away and one more at the end of the turn.
    fn on_added(&self, cx: &mut HookCx<'_>, node: NodeId) {
        cx.engine.attach(node, &self.kind);
        cx.immediate.push((node, SyncReason::Added));
        cx.scheduler.request(node, SyncReason::Added);
    }

    /// Deferred declared-connectivity pass, then a live pass once the host
    /// has finished wiring.
    fn on_configure(&self, cx: &mut HookCx<'_>, node: NodeId) {
        cx.engine.attach(node, &self.kind);
        cx.scheduler.request(node, SyncReason::Configured);
        let delay = cx.engine.settings().post_load_delay();
        cx.scheduler.request_after(node, SyncReason::PostLoad, delay);
    }

    fn on_connections_change(&self, cx: &mut HookCx<'_>, change: &ConnectionChange) {
        let node = change.node;
        if cx.context.is_loading() || cx.engine.is_syncing(node) {
            return;
        }
        if !change.connected {
            cx.scheduler.request_disconnect_check(node, change.side, change.slot);
            return;
        }
        if let Err(error) = cx.engine.preseed(cx.graph, change) {
            tracing::error!(node = %node, phase = "preseed", %error, "failed to pre-seed link type");
        }
        cx.scheduler.request(node, SyncReason::Connected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Counting(Cell<usize>);

    impl NodeHooks for Counting {
        fn on_added(&self, _cx: &mut HookCx<'_>, _node: NodeId) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn registry_keeps_registration_order() {
        let mut registry = HookRegistry::new();
        let first: Rc<dyn NodeHooks> = Rc::new(DynamicHooks::new(DynamicKind::Passthrough));
        let second = Rc::new(Counting(Cell::new(0)));
        registry.register("PT_DynamicPassthrough", first);
        registry.register("PT_DynamicPassthrough", second.clone());
        assert_eq!(registry.hooks_for("PT_DynamicPassthrough").len(), 2);
        assert!(registry.hooks_for("KSampler").is_empty());
        assert!(!registry.is_registered("KSampler"));
    }

    #[test]
    fn added_runs_now_and_later() {
        let mut graph = HostGraph::new();
        let node = graph.add_node("PT_DynamicPassthrough");
        let mut engine = Engine::new(Default::default());
        let mut scheduler = Scheduler::new();
        let mut immediate = Vec::new();
        let hooks = DynamicHooks::new(DynamicKind::Passthrough);
        let mut cx = HookCx {
            graph: &mut graph,
            engine: &mut engine,
            scheduler: &mut scheduler,
            context: HookContext::idle(),
            immediate: &mut immediate,
        };
        hooks.on_added(&mut cx, node);
        assert_eq!(immediate, vec![(node, SyncReason::Added)]);
        assert!(scheduler.is_pending(node));
        assert!(engine.is_dynamic(node));
    }

    #[test]
    fn configure_defers_and_arms_post_load_timer() {
        let mut graph = HostGraph::new();
        let node = graph.add_node("PT_DynamicBus");
        let mut engine = Engine::new(Default::default());
        let mut scheduler = Scheduler::new();
        let mut immediate = Vec::new();
        let mut cx = HookCx {
            graph: &mut graph,
            engine: &mut engine,
            scheduler: &mut scheduler,
            context: HookContext::idle(),
            immediate: &mut immediate,
        };
        DynamicHooks::new(DynamicKind::Bus).on_configure(&mut cx, node);
        assert!(immediate.is_empty());
        assert_eq!(scheduler.timer_count(), 1);
        assert!(engine.is_bus(node));
    }
}
