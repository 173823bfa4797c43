//! Link type resolution.
//!
//! Every function here answers "what is the most specific concrete type
//! known for this link or slot?" by reading declared slot types and cached
//! link types. A missing node, slot or link is treated as no information and
//! the answer degrades to [`SlotType::Any`]; nothing here errors.

use portflow_core::{ConnectionChange, HostGraph, Link, NodeId, SlotSide, SlotType};

// ---------------------------------------------------------------------------
// Declared types
// ---------------------------------------------------------------------------

/// `node`'s declared output type at `slot`, when concrete.
pub fn declared_output(graph: &HostGraph, node: NodeId, slot: usize) -> Option<SlotType> {
    graph
        .node(node)?
        .outputs
        .get(slot)?
        .ty
        .concrete()
        .cloned()
}

/// `node`'s declared input type at `slot`, when concrete.
pub fn declared_input(graph: &HostGraph, node: NodeId, slot: usize) -> Option<SlotType> {
    graph
        .node(node)?
        .inputs
        .get(slot)?
        .ty
        .concrete()
        .cloned()
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// Type of a single link: origin output, then target input, then the cached
/// link type, then the wildcard.
pub fn link_type_from_endpoints(graph: &HostGraph, link: &Link) -> SlotType {
    declared_output(graph, link.origin, link.origin_slot)
        .or_else(|| declared_input(graph, link.target, link.target_slot))
        .or_else(|| link.ty.concrete().cloned())
        .unwrap_or(SlotType::Any)
}

/// Endpoint resolution, then the declared type of the far end as seen from
/// `local_side` of the link.
fn resolve_through_link(graph: &HostGraph, link: &Link, local_side: SlotSide) -> SlotType {
    let ty = link_type_from_endpoints(graph, link);
    if ty.is_concrete() {
        return ty;
    }
    let peer = match local_side {
        SlotSide::Output => declared_input(graph, link.target, link.target_slot),
        SlotSide::Input => declared_output(graph, link.origin, link.origin_slot),
    };
    peer.unwrap_or(SlotType::Any)
}

fn input_link(graph: &HostGraph, node: NodeId, slot: usize) -> Option<&Link> {
    graph.live_input_link(node, slot)
}

fn first_output_link(graph: &HostGraph, node: NodeId, slot: usize) -> Option<&Link> {
    graph.live_output_links(node, slot).into_iter().next()
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// Passthrough pair resolution: the output side's first link wins, then the
/// input side's link.
pub fn resolve_pair_type(graph: &HostGraph, node: NodeId, slot: usize) -> SlotType {
    if let Some(link) = first_output_link(graph, node, slot) {
        let ty = resolve_through_link(graph, link, SlotSide::Output);
        if ty.is_concrete() {
            return ty;
        }
    }
    if let Some(link) = input_link(graph, node, slot) {
        return resolve_through_link(graph, link, SlotSide::Input);
    }
    SlotType::Any
}

/// Input-first resolution used by bus and single-pair nodes. Falls back to
/// the slot's own declared types while a side is connected.
pub fn resolve_connected_type(graph: &HostGraph, node: NodeId, slot: usize) -> SlotType {
    let incoming = input_link(graph, node, slot);
    let outgoing = first_output_link(graph, node, slot);

    if let Some(link) = incoming {
        let ty = resolve_through_link(graph, link, SlotSide::Input);
        if ty.is_concrete() {
            return ty;
        }
    }
    if let Some(link) = outgoing {
        let ty = resolve_through_link(graph, link, SlotSide::Output);
        if ty.is_concrete() {
            return ty;
        }
    }
    if incoming.is_some() {
        if let Some(ty) = declared_input(graph, node, slot) {
            return ty;
        }
    }
    if outgoing.is_some() {
        if let Some(ty) = declared_output(graph, node, slot) {
            return ty;
        }
    }
    SlotType::Any
}

/// Type arriving at an input: endpoint resolution of its link, then the
/// origin's declared output.
pub fn resolve_input_type(graph: &HostGraph, node: NodeId, slot: usize) -> SlotType {
    match input_link(graph, node, slot) {
        Some(link) => resolve_through_link(graph, link, SlotSide::Input),
        None => SlotType::Any,
    }
}

/// Type a freshly created link should be pre-seeded with, seen from the
/// node receiving `change`.
pub fn infer_new_link_type(graph: &HostGraph, change: &ConnectionChange) -> SlotType {
    let link = graph.link(change.link.id).unwrap_or(&change.link);
    let peer = match change.side {
        SlotSide::Input => declared_output(graph, link.origin, link.origin_slot),
        SlotSide::Output => declared_input(graph, link.target, link.target_slot),
    };
    peer.unwrap_or_else(|| link_type_from_endpoints(graph, link))
}

// ---------------------------------------------------------------------------
// Write-back
// ---------------------------------------------------------------------------

/// Caches a concrete `ty` on the input link and every output link at `slot`.
/// Wildcards are never written.
pub fn update_link_types_for_slot(graph: &mut HostGraph, node: NodeId, slot: usize, ty: &SlotType) {
    if ty.is_any() {
        return;
    }
    update_input_link_type(graph, node, slot, ty);
    update_output_link_types(graph, node, slot, ty);
}

pub fn update_input_link_type(graph: &mut HostGraph, node: NodeId, slot: usize, ty: &SlotType) {
    if ty.is_any() {
        return;
    }
    let id = graph.live_input_link(node, slot).map(|link| link.id);
    if let Some(id) = id {
        graph.set_link_type(id, ty.clone());
    }
}

pub fn update_output_link_types(graph: &mut HostGraph, node: NodeId, slot: usize, ty: &SlotType) {
    if ty.is_any() {
        return;
    }
    let ids: Vec<_> = graph
        .live_output_links(node, slot)
        .iter()
        .map(|link| link.id)
        .collect();
    for id in ids {
        graph.set_link_type(id, ty.clone());
    }
}
