//! The host editor adapter.
//!
//! [`Editor`] plays the part of the node-graph editor: it owns the
//! [`HostGraph`], performs structural edits, and delivers the resulting
//! events to the registered hooks. Deferred work runs when the caller
//! settles the editor; timers run when the caller advances its clock.
//!
//! ```text
//! edit -> ConnectionChange -> hooks -> scheduler -> settle -> Engine::synchronize
//!                                                              |
//!                   (changes on other nodes) <- dispatch <------+
//! ```

use std::rc::Rc;
use std::time::Duration;

use indexmap::IndexMap;

use portflow_core::{ConnectionChange, CoreError, HostGraph, LinkId, NodeId, SlotType, Workflow};

use crate::bus::{self, ChannelMap, BUS_TYPES_PROPERTY, OVERWRITE_WIDGET};
use crate::engine::Engine;
use crate::error::EngineError;
use crate::hooks::{DynamicHooks, HookCx, HookRegistry, NodeHooks};
use crate::kinds::{self, builtin_defs, DynamicKind, NodeDef, PreviewMessage, PreviewState};
use crate::lifecycle::{self, HookContext, LoadSession, NodePhase, PendingSync, Scheduler, SyncReason};
use crate::settings::EngineSettings;
use crate::topology;

pub struct Editor {
    graph: HostGraph,
    defs: IndexMap<String, NodeDef>,
    hooks: HookRegistry,
    scheduler: Scheduler,
    engine: Engine,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor").field("graph", &self.graph).finish_non_exhaustive()
    }
}

impl Default for Editor {
    fn default() -> Self {
        Editor::new(EngineSettings::default())
    }
}

impl Editor {
    /// An empty editor with the built-in dynamic node types registered.
    pub fn new(settings: EngineSettings) -> Self {
        let mut editor = Editor {
            graph: HostGraph::new(),
            defs: IndexMap::new(),
            hooks: HookRegistry::new(),
            scheduler: Scheduler::new(),
            engine: Engine::new(settings),
        };
        for def in builtin_defs() {
            editor.register_node_def(def);
        }
        editor
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Registers a node type. Dynamic types get their hooks installed on
    /// first registration; later registrations only replace the ports.
    pub fn register_node_def(&mut self, def: NodeDef) -> Option<DynamicKind> {
        let kind = DynamicKind::classify(&def);
        let class_type = def.class_type.clone();
        let first = self.defs.insert(class_type.clone(), def).is_none();
        if let (Some(kind), true) = (&kind, first) {
            tracing::debug!(class_type = %class_type, kind = ?kind, "registered dynamic node type");
            self.hooks.register(&class_type, Rc::new(DynamicHooks::new(kind.clone())));
        }
        kind
    }

    /// Adds extra handlers for `class_type`, run after those already there.
    pub fn register_hooks(&mut self, class_type: &str, hooks: Rc<dyn NodeHooks>) {
        self.hooks.register(class_type, hooks);
    }

    pub fn node_def(&self, class_type: &str) -> Option<&NodeDef> {
        self.defs.get(class_type)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn graph(&self) -> &HostGraph {
        &self.graph
    }

    pub fn settings(&self) -> &EngineSettings {
        self.engine.settings()
    }

    pub fn kind(&self, node: NodeId) -> Option<&DynamicKind> {
        self.engine.kind(node)
    }

    /// The channel map a bus node currently publishes.
    pub fn channel_map(&self, node: NodeId) -> Option<ChannelMap> {
        self.graph
            .node(node)?
            .property(BUS_TYPES_PROPERTY)
            .map(ChannelMap::from_property)
    }

    /// Scheduling phase of a dynamic node.
    pub fn phase(&self, node: NodeId) -> Option<NodePhase> {
        self.engine
            .lifecycle(node)
            .map(|l| lifecycle::phase_of(l, &self.scheduler, node))
    }

    /// Completed passes over a dynamic node.
    pub fn pass_count(&self, node: NodeId) -> Option<u64> {
        self.engine.lifecycle(node).map(|l| l.passes)
    }

    pub fn preview(&self, node: NodeId) -> Option<&PreviewState> {
        self.engine.state(node)?.as_preview().map(|p| p.state())
    }

    pub fn to_workflow(&self) -> Workflow {
        Workflow::from(&self.graph)
    }

    // -----------------------------------------------------------------------
    // Structural edits
    // -----------------------------------------------------------------------

    /// Adds a node of a registered type with its default ports.
    pub fn add_node(&mut self, class_type: &str) -> Result<NodeId, EngineError> {
        let id = self.graph.add_node(class_type);
        if let Some(def) = self.defs.get(class_type) {
            kinds::apply_def_ports(&mut self.graph, id, def)?;
        }
        self.fit_plain_node(id);
        self.fire(id, HookContext::idle(), |hooks, cx| hooks.on_added(cx, id));
        Ok(id)
    }

    /// Adds a node with explicit ports, bypassing any registered definition.
    pub fn add_plain_node(
        &mut self,
        class_type: &str,
        inputs: &[(&str, SlotType)],
        outputs: &[(&str, SlotType)],
    ) -> Result<NodeId, EngineError> {
        let id = self.graph.add_node(class_type);
        for (name, ty) in inputs {
            self.graph.add_input(id, name, ty.clone())?;
        }
        for (name, ty) in outputs {
            self.graph.add_output(id, name, ty.clone())?;
        }
        self.fit_plain_node(id);
        self.fire(id, HookContext::idle(), |hooks, cx| hooks.on_added(cx, id));
        Ok(id)
    }

    pub fn remove_node(&mut self, node: NodeId) -> Result<(), EngineError> {
        let (_, changes) = self.graph.remove_node(node)?;
        self.engine.detach(node);
        self.scheduler.forget(node);
        self.dispatch(changes, HookContext::idle());
        Ok(())
    }

    /// Copies `node` without its links, the way paste does: the copy is
    /// configured from the original's snapshot, then added.
    pub fn duplicate_node(&mut self, node: NodeId) -> Result<NodeId, EngineError> {
        let mut copy = self
            .graph
            .node(node)
            .cloned()
            .ok_or(EngineError::Core(CoreError::NodeNotFound { id: node }))?;
        copy.id = self.graph.next_node_id();
        for input in &mut copy.inputs {
            input.link = None;
        }
        for output in &mut copy.outputs {
            output.links.clear();
        }
        let id = self.graph.insert_node(copy)?;
        let context = HookContext::idle();
        self.fire(id, context, |hooks, cx| hooks.on_configure(cx, id));
        self.fire(id, context, |hooks, cx| hooks.on_added(cx, id));
        Ok(id)
    }

    pub fn connect(
        &mut self,
        origin: NodeId,
        origin_slot: usize,
        target: NodeId,
        target_slot: usize,
    ) -> Result<LinkId, EngineError> {
        let (id, changes) = self.graph.connect(origin, origin_slot, target, target_slot)?;
        self.dispatch(changes, HookContext::idle());
        Ok(id)
    }

    /// Disconnects `node`'s input `slot`. Returns whether a link was removed.
    pub fn disconnect_input(&mut self, node: NodeId, slot: usize) -> Result<bool, EngineError> {
        let changes = self.graph.disconnect_input(node, slot)?;
        let removed = !changes.is_empty();
        self.dispatch(changes, HookContext::idle());
        Ok(removed)
    }

    pub fn remove_link(&mut self, id: LinkId) -> bool {
        let changes = self.graph.remove_link(id);
        let removed = !changes.is_empty();
        self.dispatch(changes, HookContext::idle());
        removed
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Replaces the graph with a saved workflow.
    ///
    /// Every node is configured inside one load session and the resulting
    /// declared-connectivity passes run before this returns. Post-load passes
    /// wait for [`Editor::advance`].
    pub fn load_workflow(&mut self, workflow: Workflow) -> Result<(), EngineError> {
        let graph = workflow.into_graph()?;
        let session = LoadSession::begin(graph.node_count());
        let context = session.context();

        self.scheduler.clear();
        self.engine.clear();
        self.graph = graph;

        let order = topology::configure_order(&self.graph, |id| self.class_is_bus(id));
        for node in order {
            self.fire(node, context, |hooks, cx| hooks.on_configure(cx, node));
        }
        self.drain(context);
        Ok(())
    }

    pub fn load_workflow_json(&mut self, text: &str) -> Result<(), EngineError> {
        let workflow = Workflow::from_json(text)?;
        self.load_workflow(workflow)
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// Queues a pass over a dynamic node.
    pub fn request_sync(&mut self, node: NodeId) -> Result<(), EngineError> {
        if !self.engine.is_dynamic(node) {
            return Err(EngineError::NotDynamic { node });
        }
        self.scheduler.request(node, SyncReason::Requested);
        Ok(())
    }

    /// Runs turns until nothing is pending. Returns the number of turns.
    pub fn settle(&mut self) -> usize {
        self.drain(HookContext::idle())
    }

    /// Moves the clock, fires due timers, and settles.
    pub fn advance(&mut self, by: Duration) -> usize {
        let fired = self.scheduler.advance(by);
        if fired > 0 {
            tracing::debug!(fired, "timers fired");
        }
        self.settle()
    }

    pub fn pending_timers(&self) -> usize {
        self.scheduler.timer_count()
    }

    // -----------------------------------------------------------------------
    // Settings and previews
    // -----------------------------------------------------------------------

    /// Switches bus overwrite mode and queues a re-merge of every bus,
    /// upstream first.
    pub fn set_bus_overwrite(&mut self, overwrite: bool) {
        self.engine.settings_mut().bus_overwrite = overwrite;
        let order = topology::bus_order(&self.graph, |id| self.engine.is_bus(id));
        for node in order {
            if let Some(n) = self.graph.node_mut(node) {
                n.set_widget(OVERWRITE_WIDGET, bus::encode_flag(overwrite));
            }
            self.scheduler.request(node, SyncReason::SettingsChanged);
        }
    }

    /// Delivers an execution message to a preview node.
    pub fn record_preview(&mut self, node: NodeId, message: PreviewMessage) -> Result<(), EngineError> {
        let preview = self
            .engine
            .state_mut(node)
            .and_then(|s| s.as_preview_mut())
            .ok_or(EngineError::NotDynamic { node })?;
        preview.state_mut().record(message);
        Ok(())
    }

    /// Selects a preview item. Out-of-range indices are ignored.
    pub fn select_preview(&mut self, node: NodeId, index: usize) -> Result<bool, EngineError> {
        let preview = self
            .engine
            .state_mut(node)
            .and_then(|s| s.as_preview_mut())
            .ok_or(EngineError::NotDynamic { node })?;
        Ok(preview.state_mut().select(index))
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn class_is_bus(&self, node: NodeId) -> bool {
        self.graph
            .node(node)
            .and_then(|n| self.defs.get(&n.class_type))
            .and_then(DynamicKind::classify)
            .is_some_and(|k| k.is_bus())
    }

    fn fit_plain_node(&mut self, node: NodeId) {
        if let Some(n) = self.graph.node_mut(node) {
            n.size = n.compute_size();
        }
    }

    /// Calls every hook registered for `node`'s class type, then runs any
    /// passes they asked for immediately.
    fn fire<F>(&mut self, node: NodeId, context: HookContext, call: F)
    where
        F: Fn(&dyn NodeHooks, &mut HookCx<'_>),
    {
        let Some(class_type) = self.graph.node(node).map(|n| n.class_type.clone()) else {
            return;
        };
        let mut immediate = Vec::new();
        for hooks in self.hooks.hooks_for(&class_type) {
            let mut cx = HookCx {
                graph: &mut self.graph,
                engine: &mut self.engine,
                scheduler: &mut self.scheduler,
                context,
                immediate: &mut immediate,
            };
            call(hooks.as_ref(), &mut cx);
        }
        for (node, reason) in immediate {
            self.run_pass(node, &PendingSync::new(reason), context);
        }
    }

    fn dispatch(&mut self, changes: Vec<ConnectionChange>, context: HookContext) {
        for change in changes {
            self.fire(change.node, context, |hooks, cx| hooks.on_connections_change(cx, &change));
        }
    }

    fn drain(&mut self, context: HookContext) -> usize {
        let limit = self.engine.settings().max_turns;
        let mut turns = 0;
        while !self.scheduler.is_idle() {
            if turns == limit {
                tracing::warn!(turns, "passes still pending after turn limit, giving up");
                break;
            }
            for (node, pending) in self.scheduler.take_turn() {
                self.run_pass(node, &pending, context);
            }
            turns += 1;
        }
        turns
    }

    /// One pass with the node's guard up. Failures are logged and dropped.
    fn run_pass(&mut self, node: NodeId, pending: &PendingSync, context: HookContext) {
        if !self.engine.is_dynamic(node) {
            return;
        }
        self.engine.begin_pass(node);
        match self.engine.synchronize(&mut self.graph, node, pending, context) {
            Ok(outcome) => {
                self.dispatch(outcome.changes, context);
                for target in outcome.notify {
                    if self.engine.is_bus(target) {
                        self.scheduler.request(target, SyncReason::BusChanged);
                    }
                }
            }
            Err(error) => {
                tracing::error!(node = %node, phase = "synchronize", %error, "dynamic pass failed");
            }
        }
        self.engine.end_pass(node);
    }
}
