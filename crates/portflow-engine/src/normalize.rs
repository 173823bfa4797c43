//! Port set normalization.
//!
//! Keeps a dynamic node's slot arrays at `lastConnected + 2` rows: every
//! connected row, plus exactly one trailing empty row for the next
//! connection, clamped to the kind's bounds. Interior rows emptied by a
//! disconnect are spliced out when something after them is still connected.

use portflow_core::{ConnectionChange, HostGraph, NodeId, SlotSide, SlotType};

use crate::error::EngineError;
use crate::labels::DefaultLabels;

/// How connectivity is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// Any recorded link id counts. Used while the link table of a freshly
    /// loaded graph may still be incomplete.
    Declared,
    /// The id must resolve to a link that points back at the slot.
    Live,
}

/// Which arrays a kind keeps in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotLayout {
    /// Input `i` and output `i` form one row.
    Paired,
    /// Only inputs are dynamic; outputs are left alone.
    InputsOnly,
}

/// Row-count bounds for one node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotBounds {
    pub min: usize,
    pub max: usize,
    /// First row subject to normalization; earlier rows are reserved.
    pub first_dynamic: usize,
}

/// Everything the normalizer needs to know about a node kind.
#[derive(Debug, Clone, Copy)]
pub struct NormalizePlan<'a> {
    pub bounds: SlotBounds,
    pub layout: SlotLayout,
    pub defaults: DefaultLabels<'a>,
}

pub fn input_connected(graph: &HostGraph, node: NodeId, slot: usize, mode: Connectivity) -> bool {
    match mode {
        Connectivity::Live => graph.input_is_live(node, slot),
        Connectivity::Declared => graph
            .node(node)
            .and_then(|n| n.inputs.get(slot))
            .is_some_and(|s| s.link.is_some()),
    }
}

pub fn output_connected(graph: &HostGraph, node: NodeId, slot: usize, mode: Connectivity) -> bool {
    match mode {
        Connectivity::Live => graph.output_is_live(node, slot),
        Connectivity::Declared => graph
            .node(node)
            .and_then(|n| n.outputs.get(slot))
            .is_some_and(|s| !s.links.is_empty()),
    }
}

/// Whether row `slot` is connected on any side the layout manages.
pub fn row_connected(graph: &HostGraph, node: NodeId, slot: usize, layout: SlotLayout, mode: Connectivity) -> bool {
    input_connected(graph, node, slot, mode)
        || (layout == SlotLayout::Paired && output_connected(graph, node, slot, mode))
}

fn row_count(graph: &HostGraph, node: NodeId, layout: SlotLayout) -> usize {
    graph.node(node).map_or(0, |n| match layout {
        SlotLayout::Paired => n.slot_count(),
        SlotLayout::InputsOnly => n.inputs.len(),
    })
}

/// Highest connected row at or after `first_dynamic`.
pub fn last_connected(
    graph: &HostGraph,
    node: NodeId,
    plan: &NormalizePlan<'_>,
    mode: Connectivity,
) -> Option<usize> {
    let rows = row_count(graph, node, plan.layout);
    (plan.bounds.first_dynamic..rows)
        .rev()
        .find(|&i| row_connected(graph, node, i, plan.layout, mode))
}

/// Target row count: `lastConnected + 2` clamped to the bounds, but never
/// short of keeping every connected row.
pub fn desired_len(last: Option<usize>, bounds: SlotBounds) -> usize {
    let wanted = last.map_or(1, |i| i + 2);
    let clamped = wanted.clamp(bounds.min, bounds.max.max(bounds.min));
    clamped.max(last.map_or(0, |i| i + 1))
}

/// Shrinks or grows `node` to its desired length.
///
/// Returns the structural changes caused by removals (links on trimmed rows
/// are disconnected by the host).
pub fn normalize(
    graph: &mut HostGraph,
    node: NodeId,
    plan: &NormalizePlan<'_>,
    mode: Connectivity,
) -> Result<Vec<ConnectionChange>, EngineError> {
    let Some(n) = graph.node(node) else {
        return Ok(Vec::new());
    };
    let (inputs, outputs) = (n.inputs.len(), n.outputs.len());
    let desired = desired_len(last_connected(graph, node, plan, mode), plan.bounds);
    let mut changes = Vec::new();

    for index in (desired..inputs).rev() {
        changes.extend(graph.remove_input(node, index)?);
    }
    for _ in inputs..desired {
        let idx = graph.add_input(node, plan.defaults.input, SlotType::Any)?;
        tracing::trace!(node = %node, slot = idx, "appended input");
    }

    if plan.layout == SlotLayout::Paired {
        for index in (desired..outputs).rev() {
            changes.extend(graph.remove_output(node, index)?);
        }
        for _ in outputs..desired {
            graph.add_output(node, plan.defaults.output, SlotType::Any)?;
        }
    }
    Ok(changes)
}

/// Splices out row `slot` after a disconnect, when it is empty and a later
/// row is still connected.
///
/// Skipped when the slot was re-populated by a replacement link, when the
/// paired side is still connected, and for reserved rows. Returns whether a
/// row was removed, plus the resulting changes.
pub fn compact_gap(
    graph: &mut HostGraph,
    node: NodeId,
    side: SlotSide,
    slot: usize,
    plan: &NormalizePlan<'_>,
) -> Result<(bool, Vec<ConnectionChange>), EngineError> {
    let mode = Connectivity::Live;
    if slot < plan.bounds.first_dynamic || slot >= row_count(graph, node, plan.layout) {
        return Ok((false, Vec::new()));
    }
    if plan.layout == SlotLayout::InputsOnly && side == SlotSide::Output {
        return Ok((false, Vec::new()));
    }
    if row_connected(graph, node, slot, plan.layout, mode) {
        return Ok((false, Vec::new()));
    }
    let rows = row_count(graph, node, plan.layout);
    let has_after = (slot + 1..rows).any(|i| row_connected(graph, node, i, plan.layout, mode));
    if !has_after {
        return Ok((false, Vec::new()));
    }

    let mut changes = Vec::new();
    let Some(n) = graph.node(node) else {
        return Ok((false, changes));
    };
    let (inputs, outputs) = (n.inputs.len(), n.outputs.len());
    if slot < inputs {
        changes.extend(graph.remove_input(node, slot)?);
    }
    if plan.layout == SlotLayout::Paired && slot < outputs {
        changes.extend(graph.remove_output(node, slot)?);
    }
    tracing::debug!(node = %node, slot, "removed empty interior slot");
    Ok((true, changes))
}

/// Drops every input of a node that has never been wired, so it can be
/// rebuilt from its default row.
pub fn clear_unwired_inputs(graph: &mut HostGraph, node: NodeId) -> Result<bool, EngineError> {
    let Some(n) = graph.node(node) else {
        return Ok(false);
    };
    if n.inputs.iter().any(|s| s.link.is_some()) {
        return Ok(false);
    }
    for index in (0..n.inputs.len()).rev() {
        graph.remove_input(node, index)?;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAIRED: NormalizePlan<'static> = NormalizePlan {
        bounds: SlotBounds { min: 1, max: 32, first_dynamic: 0 },
        layout: SlotLayout::Paired,
        defaults: DefaultLabels::PAIRED,
    };

    fn setup(rows: usize) -> (HostGraph, NodeId, NodeId) {
        let mut graph = HostGraph::new();
        let src = graph.add_node("Source");
        for _ in 0..4 {
            graph.add_output(src, "IMAGE", SlotType::from("IMAGE")).unwrap();
        }
        let node = graph.add_node("PT_DynamicPassthrough");
        for _ in 0..rows {
            graph.add_input(node, "input", SlotType::Any).unwrap();
            graph.add_output(node, "output", SlotType::Any).unwrap();
        }
        (graph, src, node)
    }

    fn rows(graph: &HostGraph, node: NodeId) -> (usize, usize) {
        let n = graph.node(node).unwrap();
        (n.inputs.len(), n.outputs.len())
    }

    #[test]
    fn desired_len_clamps() {
        let bounds = SlotBounds { min: 2, max: 4, first_dynamic: 1 };
        assert_eq!(desired_len(None, bounds), 2);
        assert_eq!(desired_len(Some(1), bounds), 3);
        assert_eq!(desired_len(Some(3), bounds), 4);
        assert_eq!(desired_len(Some(6), bounds), 7);
    }

    #[test]
    fn empty_node_shrinks_to_one_row() {
        let (mut graph, _, node) = setup(4);
        normalize(&mut graph, node, &PAIRED, Connectivity::Live).unwrap();
        assert_eq!(rows(&graph, node), (1, 1));
    }

    #[test]
    fn grows_one_past_last_connection() {
        let (mut graph, src, node) = setup(1);
        graph.connect(src, 0, node, 0).unwrap();
        normalize(&mut graph, node, &PAIRED, Connectivity::Live).unwrap();
        assert_eq!(rows(&graph, node), (2, 2));
        let n = graph.node(node).unwrap();
        assert_eq!(n.inputs[1].label, "input");
        assert_eq!(n.outputs[1].label, "output");
    }

    #[test]
    fn respects_max() {
        let (mut graph, src, node) = setup(2);
        graph.connect(src, 0, node, 1).unwrap();
        let plan = NormalizePlan {
            bounds: SlotBounds { min: 1, max: 2, first_dynamic: 0 },
            ..PAIRED
        };
        normalize(&mut graph, node, &plan, Connectivity::Live).unwrap();
        assert_eq!(rows(&graph, node), (2, 2));
    }

    #[test]
    fn declared_mode_keeps_rows_for_missing_links() {
        let (mut graph, src, node) = setup(3);
        let (id, _) = graph.connect(src, 0, node, 1).unwrap();
        graph.forget_link(id);
        normalize(&mut graph, node, &PAIRED, Connectivity::Declared).unwrap();
        assert_eq!(rows(&graph, node), (3, 3));
        normalize(&mut graph, node, &PAIRED, Connectivity::Live).unwrap();
        assert_eq!(rows(&graph, node), (1, 1));
    }

    #[test]
    fn compact_removes_interior_gap() {
        let (mut graph, src, node) = setup(3);
        let (a, _) = graph.connect(src, 0, node, 0).unwrap();
        let (b, _) = graph.connect(src, 1, node, 1).unwrap();
        graph.remove_link(a);
        let (removed, _) = compact_gap(&mut graph, node, SlotSide::Input, 0, &PAIRED).unwrap();
        assert!(removed);
        assert_eq!(rows(&graph, node), (2, 2));
        assert_eq!(graph.link(b).unwrap().target_slot, 0);
    }

    #[test]
    fn compact_skips_trailing_and_repopulated_rows() {
        let (mut graph, src, node) = setup(3);
        let (a, _) = graph.connect(src, 0, node, 0).unwrap();
        graph.connect(src, 1, node, 1).unwrap();
        // Replacement: slot 0 disconnected then reconnected.
        graph.remove_link(a);
        graph.connect(src, 2, node, 0).unwrap();
        let (removed, _) = compact_gap(&mut graph, node, SlotSide::Input, 0, &PAIRED).unwrap();
        assert!(!removed);
        // Nothing after slot 2.
        let (removed, _) = compact_gap(&mut graph, node, SlotSide::Input, 2, &PAIRED).unwrap();
        assert!(!removed);
    }

    #[test]
    fn compact_keeps_row_with_connected_pair() {
        let (mut graph, src, node) = setup(3);
        let sink = graph.add_node("Sink");
        graph.add_input(sink, "in", SlotType::Any).unwrap();
        let (a, _) = graph.connect(src, 0, node, 0).unwrap();
        graph.connect(node, 0, sink, 0).unwrap();
        graph.connect(src, 1, node, 1).unwrap();
        graph.remove_link(a);
        let (removed, _) = compact_gap(&mut graph, node, SlotSide::Input, 0, &PAIRED).unwrap();
        assert!(!removed);
    }

    #[test]
    fn reserved_rows_are_never_compacted() {
        let (mut graph, src, node) = setup(3);
        graph.connect(src, 1, node, 2).unwrap();
        let plan = NormalizePlan {
            bounds: SlotBounds { min: 2, max: 32, first_dynamic: 1 },
            ..PAIRED
        };
        let (removed, _) = compact_gap(&mut graph, node, SlotSide::Input, 0, &plan).unwrap();
        assert!(!removed);
        let (removed, _) = compact_gap(&mut graph, node, SlotSide::Input, 1, &plan).unwrap();
        assert!(removed);
    }

    #[test]
    fn clear_unwired_inputs_only_when_nothing_recorded() {
        let (mut graph, _, node) = setup(3);
        assert!(clear_unwired_inputs(&mut graph, node).unwrap());
        assert_eq!(graph.node(node).unwrap().inputs.len(), 0);

        let (mut graph, src, node) = setup(2);
        graph.connect(src, 0, node, 1).unwrap();
        assert!(!clear_unwired_inputs(&mut graph, node).unwrap());
    }
}
