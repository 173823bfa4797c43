//! HostGraph: the node/link container the engine runs against.
//!
//! [`HostGraph`] reproduces the bookkeeping a node-graph editor performs when
//! links are created or removed and when slots are appended or spliced out.
//! Every structural mutator returns the [`ConnectionChange`] records the host
//! would deliver to the affected nodes' connection callbacks, in delivery
//! order. The caller decides what to do with them.
//!
//! # Identity
//!
//! Nodes and links live in insertion-ordered maps keyed by ids drawn from two
//! monotonic counters. Ids are never reused, so a deferred pass holding an id
//! from a removed entity simply finds nothing.
//!
//! # Liveness
//!
//! Slot link ids are hints. An input is *live* when its id resolves to a link
//! whose target is that node and slot; an output is live when at least one of
//! its ids resolves to a link whose origin is that node and slot. Anything
//! else is a stale reference and counts as no connection.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{LinkId, NodeId};
use crate::link::Link;
use crate::node::Node;
use crate::slot::{InputSlot, OutputSlot, SlotSide};
use crate::slot_type::SlotType;

/// One structural notification: `node`'s `side` slot `slot` gained or lost
/// `link`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionChange {
    pub node: NodeId,
    pub side: SlotSide,
    pub slot: usize,
    pub connected: bool,
    /// Snapshot of the link at the time of the change.
    pub link: Link,
}

/// The host graph container.
#[derive(Debug, Clone, Default)]
pub struct HostGraph {
    nodes: IndexMap<NodeId, Node>,
    links: IndexMap<LinkId, Link>,
    /// Highest node id handed out so far.
    last_node_id: u32,
    /// Highest link id handed out so far.
    last_link_id: u32,
}

impl HostGraph {
    pub fn new() -> Self {
        HostGraph::default()
    }

    /// Reassembles a graph from loaded parts without validating slot
    /// references; a saved slot may name a link that arrives later.
    pub fn from_parts(
        nodes: Vec<Node>,
        links: Vec<Link>,
        last_node_id: u32,
        last_link_id: u32,
    ) -> Result<Self, CoreError> {
        let mut graph = HostGraph {
            last_node_id,
            last_link_id,
            ..HostGraph::default()
        };
        for node in nodes {
            graph.insert_node(node)?;
        }
        for link in links {
            graph.restore_link(link)?;
        }
        Ok(graph)
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Mutable access to a node. Port arrays edited through this reference
    /// bypass link renumbering; use the slot mutators for structure.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(&id)
    }

    /// Links in insertion order.
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn last_node_id(&self) -> u32 {
        self.last_node_id
    }

    pub fn last_link_id(&self) -> u32 {
        self.last_link_id
    }

    // -----------------------------------------------------------------------
    // Liveness
    // -----------------------------------------------------------------------

    /// The link feeding `node`'s input `slot`, if the recorded id is live.
    pub fn live_input_link(&self, node: NodeId, slot: usize) -> Option<&Link> {
        let id = self.nodes.get(&node)?.inputs.get(slot)?.link?;
        self.links
            .get(&id)
            .filter(|link| link.target == node && link.target_slot == slot)
    }

    /// Live links leaving `node`'s output `slot`, in the output's order.
    ///
    /// A link only counts while its target input still records its id; an
    /// input that has since been re-wired leaves a stale id behind here.
    pub fn live_output_links(&self, node: NodeId, slot: usize) -> Vec<&Link> {
        let Some(output) = self.nodes.get(&node).and_then(|n| n.outputs.get(slot)) else {
            return Vec::new();
        };
        output
            .links
            .iter()
            .filter_map(|id| self.links.get(id))
            .filter(|link| link.origin == node && link.origin_slot == slot)
            .filter(|link| self.input_references(link))
            .collect()
    }

    fn input_references(&self, link: &Link) -> bool {
        self.nodes
            .get(&link.target)
            .and_then(|n| n.inputs.get(link.target_slot))
            .and_then(|s| s.link)
            == Some(link.id)
    }

    pub fn input_is_live(&self, node: NodeId, slot: usize) -> bool {
        self.live_input_link(node, slot).is_some()
    }

    pub fn output_is_live(&self, node: NodeId, slot: usize) -> bool {
        !self.live_output_links(node, slot).is_empty()
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    /// Adds an empty node of `class_type` and returns its fresh id.
    pub fn add_node(&mut self, class_type: &str) -> NodeId {
        self.last_node_id += 1;
        let id = NodeId(self.last_node_id);
        self.nodes.insert(id, Node::new(id, class_type));
        id
    }

    /// Inserts a node under its own id, advancing the id counter past it.
    pub fn insert_node(&mut self, node: Node) -> Result<NodeId, CoreError> {
        let id = node.id;
        if self.nodes.contains_key(&id) {
            return Err(CoreError::DuplicateNode { id });
        }
        self.last_node_id = self.last_node_id.max(id.0);
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Allocates the next node id without inserting anything.
    pub fn next_node_id(&mut self) -> NodeId {
        self.last_node_id += 1;
        NodeId(self.last_node_id)
    }

    /// Removes a node and every link touching it.
    ///
    /// The returned changes concern the far ends only; the removed node gets
    /// no notifications.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(Node, Vec<ConnectionChange>), CoreError> {
        if !self.nodes.contains_key(&id) {
            return Err(CoreError::NodeNotFound { id });
        }
        let touching: Vec<LinkId> = self
            .links
            .values()
            .filter(|link| link.origin == id || link.target == id)
            .map(|link| link.id)
            .collect();
        let mut changes = Vec::new();
        for link_id in touching {
            changes.extend(self.remove_link(link_id));
        }
        changes.retain(|change| change.node != id);
        let node = self
            .nodes
            .shift_remove(&id)
            .ok_or(CoreError::NodeNotFound { id })?;
        Ok((node, changes))
    }

    // -----------------------------------------------------------------------
    // Slots
    // -----------------------------------------------------------------------

    /// Appends an input and returns its index.
    pub fn add_input(&mut self, node: NodeId, name: &str, ty: SlotType) -> Result<usize, CoreError> {
        let n = self.node_entry(node)?;
        n.inputs.push(InputSlot::new(name, ty));
        Ok(n.inputs.len() - 1)
    }

    /// Appends an output and returns its index.
    pub fn add_output(&mut self, node: NodeId, name: &str, ty: SlotType) -> Result<usize, CoreError> {
        let n = self.node_entry(node)?;
        n.outputs.push(OutputSlot::new(name, ty));
        Ok(n.outputs.len() - 1)
    }

    /// Removes input `slot`: disconnects it, splices it out, and shifts the
    /// `target_slot` of links on later inputs down by one.
    pub fn remove_input(&mut self, node: NodeId, slot: usize) -> Result<Vec<ConnectionChange>, CoreError> {
        self.check_slot(node, SlotSide::Input, slot)?;
        let changes = self.disconnect_input(node, slot)?;
        let n = self.node_entry(node)?;
        n.inputs.remove(slot);
        let shifted: Vec<LinkId> = n.inputs[slot..].iter().filter_map(|s| s.link).collect();
        for id in shifted {
            if let Some(link) = self.links.get_mut(&id) {
                if link.target == node && link.target_slot > slot {
                    link.target_slot -= 1;
                }
            }
        }
        Ok(changes)
    }

    /// Removes output `slot`: disconnects every link on it, splices it out,
    /// and shifts the `origin_slot` of links on later outputs down by one.
    pub fn remove_output(&mut self, node: NodeId, slot: usize) -> Result<Vec<ConnectionChange>, CoreError> {
        self.check_slot(node, SlotSide::Output, slot)?;
        let ids: Vec<LinkId> = self.node_entry(node)?.outputs[slot].links.to_vec();
        let mut changes = Vec::new();
        for id in ids {
            changes.extend(self.remove_link(id));
        }
        let n = self.node_entry(node)?;
        n.outputs.remove(slot);
        let shifted: Vec<LinkId> = n.outputs[slot..]
            .iter()
            .flat_map(|s| s.links.iter().copied())
            .collect();
        for id in shifted {
            if let Some(link) = self.links.get_mut(&id) {
                if link.origin == node && link.origin_slot > slot {
                    link.origin_slot -= 1;
                }
            }
        }
        Ok(changes)
    }

    // -----------------------------------------------------------------------
    // Links
    // -----------------------------------------------------------------------

    /// Connects `origin`'s output to `target`'s input.
    ///
    /// An occupied target input is disconnected first. Changes are returned
    /// in host delivery order: any replacement disconnects, then the origin
    /// output, then the target input.
    pub fn connect(
        &mut self,
        origin: NodeId,
        origin_slot: usize,
        target: NodeId,
        target_slot: usize,
    ) -> Result<(LinkId, Vec<ConnectionChange>), CoreError> {
        self.check_slot(origin, SlotSide::Output, origin_slot)?;
        self.check_slot(target, SlotSide::Input, target_slot)?;

        let mut changes = self.disconnect_input(target, target_slot)?;

        self.last_link_id += 1;
        let id = LinkId(self.last_link_id);
        let link = Link {
            id,
            origin,
            origin_slot,
            target,
            target_slot,
            ty: SlotType::Any,
        };
        self.node_entry(origin)?.outputs[origin_slot].links.push(id);
        self.node_entry(target)?.inputs[target_slot].link = Some(id);
        self.links.insert(id, link.clone());

        changes.push(ConnectionChange {
            node: origin,
            side: SlotSide::Output,
            slot: origin_slot,
            connected: true,
            link: link.clone(),
        });
        changes.push(ConnectionChange {
            node: target,
            side: SlotSide::Input,
            slot: target_slot,
            connected: true,
            link,
        });
        Ok((id, changes))
    }

    /// Removes whatever link feeds `node`'s input `slot`. An empty input, or
    /// one holding a stale id, yields no changes; a stale id is cleared.
    pub fn disconnect_input(&mut self, node: NodeId, slot: usize) -> Result<Vec<ConnectionChange>, CoreError> {
        self.check_slot(node, SlotSide::Input, slot)?;
        let recorded = self.node_entry(node)?.inputs[slot].link;
        match recorded {
            Some(id) if self.input_is_live(node, slot) => Ok(self.remove_link(id)),
            Some(_) => {
                self.node_entry(node)?.inputs[slot].link = None;
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }

    /// Removes a link and clears both ends' references to it. Unknown ids
    /// are a no-op.
    ///
    /// Changes: target input first, then origin output.
    pub fn remove_link(&mut self, id: LinkId) -> Vec<ConnectionChange> {
        let Some(link) = self.links.shift_remove(&id) else {
            return Vec::new();
        };
        let mut changes = Vec::with_capacity(2);
        if let Some(input) = self
            .nodes
            .get_mut(&link.target)
            .and_then(|n| n.inputs.get_mut(link.target_slot))
        {
            if input.link == Some(id) {
                input.link = None;
                changes.push(ConnectionChange {
                    node: link.target,
                    side: SlotSide::Input,
                    slot: link.target_slot,
                    connected: false,
                    link: link.clone(),
                });
            }
        }
        if let Some(output) = self
            .nodes
            .get_mut(&link.origin)
            .and_then(|n| n.outputs.get_mut(link.origin_slot))
        {
            if let Some(pos) = output.links.iter().position(|l| *l == id) {
                output.links.remove(pos);
                changes.push(ConnectionChange {
                    node: link.origin,
                    side: SlotSide::Output,
                    slot: link.origin_slot,
                    connected: false,
                    link,
                });
            }
        }
        changes
    }

    /// Overwrites a link's cached type. Returns `false` for unknown ids.
    pub fn set_link_type(&mut self, id: LinkId, ty: SlotType) -> bool {
        match self.links.get_mut(&id) {
            Some(link) => {
                link.ty = ty;
                true
            }
            None => false,
        }
    }

    /// Drops a link record while leaving slot references in place. The ids
    /// left behind become stale.
    pub fn forget_link(&mut self, id: LinkId) -> Option<Link> {
        self.links.shift_remove(&id)
    }

    /// Inserts a link record without touching any slot; used when links are
    /// wired after the nodes that reference them were loaded.
    pub fn restore_link(&mut self, link: Link) -> Result<(), CoreError> {
        if self.links.contains_key(&link.id) {
            return Err(CoreError::DuplicateLink { id: link.id });
        }
        self.last_link_id = self.last_link_id.max(link.id.0);
        self.links.insert(link.id, link);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn node_entry(&mut self, id: NodeId) -> Result<&mut Node, CoreError> {
        self.nodes.get_mut(&id).ok_or(CoreError::NodeNotFound { id })
    }

    fn check_slot(&self, node: NodeId, side: SlotSide, slot: usize) -> Result<(), CoreError> {
        let n = self.nodes.get(&node).ok_or(CoreError::NodeNotFound { id: node })?;
        let len = match side {
            SlotSide::Input => n.inputs.len(),
            SlotSide::Output => n.outputs.len(),
        };
        if slot < len {
            Ok(())
        } else {
            Err(CoreError::SlotOutOfRange { node, side, slot })
        }
    }

    /// Verifies that every live link is referenced from both of its ends.
    ///
    /// Only called from tests and debug builds.
    #[cfg(debug_assertions)]
    pub fn assert_consistency(&self) {
        for link in self.links.values() {
            if let Some(input) = self
                .nodes
                .get(&link.target)
                .and_then(|n| n.inputs.get(link.target_slot))
            {
                assert_eq!(
                    input.link,
                    Some(link.id),
                    "link {} not referenced by its target input",
                    link.id
                );
            }
            if let Some(output) = self
                .nodes
                .get(&link.origin)
                .and_then(|n| n.outputs.get(link.origin_slot))
            {
                assert!(
                    output.links.contains(&link.id),
                    "link {} not referenced by its origin output",
                    link.id
                );
            }
        }
    }
}
