//! Dynamic node kinds.
//!
//! Each kind implements [`SlotBehavior`], the capability set a pass drives:
//! normalize the arrays, resolve a type per row, write names/labels/types
//! back. [`DynamicNode`] is the tagged union of all kinds, carrying each
//! kind's typed per-node state.
//!
//! Kinds are matched to host node types through [`NodeDef`]s: the built-in
//! class types map directly, and any `PT_Any…Switch` definition becomes a
//! switch whose label prefix is derived from its optional input names.

pub mod bus;
pub mod passthrough;
pub mod preview;
pub mod single;
pub mod switch;

use portflow_core::{ConnectionChange, CoreError, HostGraph, Node, NodeId, SlotSide, SlotType};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::labels::SlotText;
use crate::normalize::{self, Connectivity, NormalizePlan, SlotLayout};
use crate::resolve;
use crate::settings::EngineSettings;

pub use bus::BusNode;
pub use passthrough::PassthroughNode;
pub use preview::{PreviewItem, PreviewMessage, PreviewNode, PreviewState};
pub use single::SingleNode;
pub use switch::{derive_input_prefix, SwitchNode};

pub const PASSTHROUGH_CLASS: &str = "PT_DynamicPassthrough";
pub const BUS_CLASS: &str = "PT_DynamicBus";
pub const PREVIEW_CLASS: &str = "PT_DynamicPreview";
pub const SINGLE_CLASS: &str = "PT_DynamicSingle";
pub const ANY_CLASS: &str = "PT_DynamicAny";

// ---------------------------------------------------------------------------
// Node definitions
// ---------------------------------------------------------------------------

/// A declared port on a node definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDecl {
    pub name: String,
    #[serde(rename = "type", default)]
    pub ty: SlotType,
}

impl PortDecl {
    pub fn new(name: &str, ty: SlotType) -> Self {
        PortDecl {
            name: name.to_string(),
            ty,
        }
    }
}

/// The host's registration record for a node type: its default ports and
/// the names of its optional inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDef {
    pub class_type: String,
    #[serde(default)]
    pub inputs: Vec<PortDecl>,
    #[serde(default)]
    pub outputs: Vec<PortDecl>,
    #[serde(default)]
    pub optional_inputs: Vec<String>,
}

impl NodeDef {
    pub fn new(class_type: &str) -> Self {
        NodeDef {
            class_type: class_type.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            optional_inputs: Vec::new(),
        }
    }

    pub fn input(mut self, name: &str, ty: SlotType) -> Self {
        self.inputs.push(PortDecl::new(name, ty));
        self
    }

    pub fn output(mut self, name: &str, ty: SlotType) -> Self {
        self.outputs.push(PortDecl::new(name, ty));
        self
    }

    pub fn optional(mut self, name: &str) -> Self {
        self.optional_inputs.push(name.to_string());
        self
    }
}

/// Definitions for the built-in dynamic node types.
pub fn builtin_defs() -> Vec<NodeDef> {
    vec![
        NodeDef::new(PASSTHROUGH_CLASS)
            .input("input", SlotType::Any)
            .output("output", SlotType::Any),
        NodeDef::new(BUS_CLASS)
            .input("bus", SlotType::bus())
            .output("bus", SlotType::bus()),
        NodeDef::new(PREVIEW_CLASS).input("input", SlotType::Any),
        NodeDef::new(SINGLE_CLASS)
            .input("input", SlotType::Any)
            .output("output", SlotType::Any),
        NodeDef::new(ANY_CLASS)
            .input("input", SlotType::Any)
            .output("output", SlotType::Any),
    ]
}

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// Which dynamic behavior a node type gets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DynamicKind {
    Passthrough,
    Bus,
    Preview,
    Single,
    Switch { prefix: String, batch: bool },
}

impl DynamicKind {
    /// Matches a node definition to a dynamic kind, if it has one.
    pub fn classify(def: &NodeDef) -> Option<DynamicKind> {
        let class = def.class_type.as_str();
        match class {
            PASSTHROUGH_CLASS => Some(DynamicKind::Passthrough),
            BUS_CLASS => Some(DynamicKind::Bus),
            PREVIEW_CLASS => Some(DynamicKind::Preview),
            SINGLE_CLASS | ANY_CLASS => Some(DynamicKind::Single),
            _ if class.starts_with("PT_Any") && class.ends_with("Switch") => {
                let names: Vec<&str> = def
                    .optional_inputs
                    .iter()
                    .chain(def.inputs.iter().map(|p| &p.name))
                    .map(String::as_str)
                    .collect();
                let prefix = derive_input_prefix(&names)?;
                Some(DynamicKind::Switch {
                    prefix,
                    batch: class.ends_with("BatchSwitch"),
                })
            }
            _ => None,
        }
    }

    /// Fresh per-node state for this kind.
    pub fn instantiate(&self) -> DynamicNode {
        match self {
            DynamicKind::Passthrough => DynamicNode::Passthrough(PassthroughNode),
            DynamicKind::Bus => DynamicNode::Bus(BusNode::default()),
            DynamicKind::Preview => DynamicNode::Preview(PreviewNode::default()),
            DynamicKind::Single => DynamicNode::Single(SingleNode),
            DynamicKind::Switch { prefix, batch } => DynamicNode::Switch(SwitchNode::new(prefix, *batch)),
        }
    }

    pub fn is_bus(&self) -> bool {
        matches!(self, DynamicKind::Bus)
    }
}

/// Per-node dynamic state, one variant per kind.
#[derive(Debug, Clone)]
pub enum DynamicNode {
    Passthrough(PassthroughNode),
    Bus(BusNode),
    Preview(PreviewNode),
    Single(SingleNode),
    Switch(SwitchNode),
}

impl DynamicNode {
    pub fn behavior_mut(&mut self) -> &mut dyn SlotBehavior {
        match self {
            DynamicNode::Passthrough(n) => n,
            DynamicNode::Bus(n) => n,
            DynamicNode::Preview(n) => n,
            DynamicNode::Single(n) => n,
            DynamicNode::Switch(n) => n,
        }
    }

    pub fn behavior(&self) -> &dyn SlotBehavior {
        match self {
            DynamicNode::Passthrough(n) => n,
            DynamicNode::Bus(n) => n,
            DynamicNode::Preview(n) => n,
            DynamicNode::Single(n) => n,
            DynamicNode::Switch(n) => n,
        }
    }

    pub fn is_bus(&self) -> bool {
        matches!(self, DynamicNode::Bus(_))
    }

    pub fn as_bus(&self) -> Option<&BusNode> {
        match self {
            DynamicNode::Bus(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_preview(&self) -> Option<&PreviewNode> {
        match self {
            DynamicNode::Preview(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_preview_mut(&mut self) -> Option<&mut PreviewNode> {
        match self {
            DynamicNode::Preview(n) => Some(n),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Pass context and behavior
// ---------------------------------------------------------------------------

/// What one synchronize pass over one node can see and touch.
pub struct PassContext<'a> {
    pub graph: &'a mut HostGraph,
    pub node: NodeId,
    pub settings: &'a EngineSettings,
    pub connectivity: Connectivity,
    pub loading: bool,
    /// Structural changes caused by the pass, for the host to deliver.
    pub changes: &'a mut Vec<ConnectionChange>,
}

impl PassContext<'_> {
    pub fn node(&self) -> Result<&Node, EngineError> {
        self.graph
            .node(self.node)
            .ok_or(EngineError::Core(CoreError::NodeNotFound { id: self.node }))
    }

    pub fn node_mut(&mut self) -> Result<&mut Node, EngineError> {
        let id = self.node;
        self.graph
            .node_mut(id)
            .ok_or(EngineError::Core(CoreError::NodeNotFound { id }))
    }

    pub fn input_connected(&self, slot: usize) -> bool {
        normalize::input_connected(self.graph, self.node, slot, self.connectivity)
    }

    pub fn output_connected(&self, slot: usize) -> bool {
        normalize::output_connected(self.graph, self.node, slot, self.connectivity)
    }
}

/// The capability set every dynamic kind provides.
///
/// A pass calls, in order: `compact_gap` for each pending disconnect,
/// `normalize`, `resolve_types`, `assign_labels`, `finish`.
pub trait SlotBehavior {
    /// Bounds, layout and default words for this kind.
    fn plan(&self, settings: &EngineSettings) -> NormalizePlan<'_>;

    fn normalize(&mut self, cx: &mut PassContext<'_>) -> Result<(), EngineError> {
        let plan = self.plan(cx.settings);
        let changes = normalize::normalize(cx.graph, cx.node, &plan, cx.connectivity)?;
        cx.changes.extend(changes);
        Ok(())
    }

    /// One resolved type per managed row.
    fn resolve_types(&mut self, cx: &mut PassContext<'_>) -> Result<Vec<SlotType>, EngineError>;

    /// Writes names, labels and types onto the rows and their links.
    fn assign_labels(&mut self, cx: &mut PassContext<'_>, types: &[SlotType]) -> Result<(), EngineError>;

    /// Removes row `slot` if a disconnect left an interior gap.
    fn compact_gap(&mut self, cx: &mut PassContext<'_>, side: SlotSide, slot: usize) -> Result<bool, EngineError> {
        let plan = self.plan(cx.settings);
        let (removed, changes) = normalize::compact_gap(cx.graph, cx.node, side, slot, &plan)?;
        cx.changes.extend(changes);
        Ok(removed)
    }

    /// Seeds the type of a freshly connected slot before the full pass.
    fn preseed(
        &mut self,
        graph: &mut HostGraph,
        settings: &EngineSettings,
        change: &ConnectionChange,
    ) -> Result<(), EngineError> {
        let plan = self.plan(settings);
        preseed_slot(graph, change, &plan);
        Ok(())
    }

    /// Post-write hook. Returns nodes that must re-synchronize as a result.
    fn finish(&mut self, _cx: &mut PassContext<'_>) -> Result<Vec<NodeId>, EngineError> {
        Ok(Vec::new())
    }

    /// Whether resizing may only ever grow this node.
    fn grow_only(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Pre-seeds the link and slot type of a new connection from its endpoints.
pub(crate) fn preseed_slot(graph: &mut HostGraph, change: &ConnectionChange, plan: &NormalizePlan<'_>) {
    if change.slot < plan.bounds.first_dynamic {
        return;
    }
    if plan.layout == SlotLayout::InputsOnly && change.side == SlotSide::Output {
        return;
    }
    let ty = resolve::infer_new_link_type(graph, change);
    let Some(label) = ty.label_base() else {
        return;
    };
    graph.set_link_type(change.link.id, ty.clone());
    let Some(node) = graph.node_mut(change.node) else {
        return;
    };
    let paired = plan.layout == SlotLayout::Paired;
    if change.side == SlotSide::Input || paired {
        if let Some(input) = node.inputs.get_mut(change.slot) {
            input.ty = ty.clone();
            input.label = label.clone();
        }
    }
    if change.side == SlotSide::Output || paired {
        if let Some(output) = node.outputs.get_mut(change.slot) {
            output.ty = ty;
            output.label = label;
        }
    }
}

/// Writes one row's names, labels and type, and caches a concrete type on
/// the row's links.
pub(crate) fn write_row(
    cx: &mut PassContext<'_>,
    slot: usize,
    ty: &SlotType,
    text: &SlotText,
    layout: SlotLayout,
) -> Result<(), EngineError> {
    let node = cx.node_mut()?;
    if let Some(input) = node.inputs.get_mut(slot) {
        input.ty = ty.clone();
        input.name = text.input_name.clone();
        input.label = text.input_label.clone();
    }
    if layout == SlotLayout::Paired {
        if let Some(output) = node.outputs.get_mut(slot) {
            output.ty = ty.clone();
            output.name = text.output_name.clone();
            output.label = text.output_label.clone();
        }
        resolve::update_link_types_for_slot(cx.graph, cx.node, slot, ty);
    } else {
        resolve::update_input_link_type(cx.graph, cx.node, slot, ty);
    }
    Ok(())
}

/// Ports a freshly added node of `def` starts with.
pub(crate) fn apply_def_ports(graph: &mut HostGraph, node: NodeId, def: &NodeDef) -> Result<(), EngineError> {
    for port in &def.inputs {
        graph.add_input(node, &port.name, port.ty.clone())?;
    }
    for port in &def.outputs {
        graph.add_output(node, &port.name, port.ty.clone())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_classes_classify() {
        for def in builtin_defs() {
            assert!(DynamicKind::classify(&def).is_some(), "{}", def.class_type);
        }
        assert_eq!(
            DynamicKind::classify(&NodeDef::new(ANY_CLASS)),
            Some(DynamicKind::Single)
        );
        assert_eq!(DynamicKind::classify(&NodeDef::new("KSampler")), None);
    }

    #[test]
    fn switch_definitions_derive_prefix() {
        let def = NodeDef::new("PT_AnyImageBatchSwitch")
            .input("image_1", SlotType::from("IMAGE"))
            .optional("image_2")
            .output("images", SlotType::from("IMAGE"));
        assert_eq!(
            DynamicKind::classify(&def),
            Some(DynamicKind::Switch { prefix: "image".into(), batch: true })
        );
    }

    #[test]
    fn switch_without_inputs_is_not_dynamic() {
        assert_eq!(DynamicKind::classify(&NodeDef::new("PT_AnyIntSwitch")), None);
    }

    #[test]
    fn instantiate_matches_kind() {
        assert!(DynamicKind::Bus.instantiate().is_bus());
        assert!(DynamicKind::Preview.instantiate().as_preview().is_some());
        assert!(!DynamicKind::Passthrough.instantiate().is_bus());
    }

    #[test]
    fn node_def_deserializes_with_defaults() {
        let def: NodeDef = serde_json::from_str(
            r#"{ "class_type": "PT_AnyMaskSwitch", "optional_inputs": ["mask_1", "mask_2"] }"#,
        )
        .unwrap();
        assert!(def.inputs.is_empty());
        assert_eq!(
            DynamicKind::classify(&def),
            Some(DynamicKind::Switch { prefix: "mask".into(), batch: false })
        );
    }
}
