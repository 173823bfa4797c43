//! Workflow documents: the saved form of a host graph.
//!
//! The layout follows the node-graph editor's own save format: nodes carry
//! their slot arrays with link ids, and links are stored once, as compact
//! arrays, in a top-level list.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::graph::HostGraph;
use crate::link::{Link, LinkRecord};
use crate::node::Node;

/// A serialized graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub last_node_id: u32,
    #[serde(default)]
    pub last_link_id: u32,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
}

impl Workflow {
    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Builds the in-memory graph. Slot references are taken verbatim.
    pub fn into_graph(self) -> Result<HostGraph, CoreError> {
        let links = self.links.into_iter().map(Link::from).collect();
        HostGraph::from_parts(self.nodes, links, self.last_node_id, self.last_link_id)
    }
}

impl From<&HostGraph> for Workflow {
    fn from(graph: &HostGraph) -> Self {
        Workflow {
            last_node_id: graph.last_node_id(),
            last_link_id: graph.last_link_id(),
            nodes: graph.nodes().cloned().collect(),
            links: graph.links().map(LinkRecord::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{LinkId, NodeId};
    use crate::slot_type::SlotType;

    const SAVED: &str = r#"{
        "last_node_id": 2,
        "last_link_id": 7,
        "nodes": [
            { "id": 1, "type": "LoadImage",
              "outputs": [ { "name": "IMAGE", "type": "IMAGE", "links": [7] } ] },
            { "id": 2, "type": "PT_DynamicPassthrough", "size": [180, 46],
              "inputs": [ { "name": "input_1", "label": "image", "type": "IMAGE", "link": 7 },
                          { "name": "input_2", "label": "input", "type": "*", "link": null } ],
              "outputs": [ { "name": "output_1", "label": "image", "type": "IMAGE", "links": null },
                           { "name": "output_2", "label": "output", "type": "*", "links": [] } ] }
        ],
        "links": [ [7, 1, 0, 2, 0, "IMAGE"] ]
    }"#;

    #[test]
    fn loads_saved_document() {
        let graph = Workflow::from_json(SAVED).unwrap().into_graph().unwrap();
        assert_eq!(graph.node_count(), 2);
        assert!(graph.input_is_live(NodeId(2), 0));
        assert_eq!(graph.link(LinkId(7)).unwrap().ty, SlotType::from("IMAGE"));
        let node = graph.node(NodeId(2)).unwrap();
        assert_eq!(node.inputs[1].ty, SlotType::Any);
        assert!(node.outputs[0].links.is_empty());
        assert_eq!(node.size, [180.0, 46.0]);
    }

    #[test]
    fn missing_links_are_tolerated() {
        let mut doc = Workflow::from_json(SAVED).unwrap();
        doc.links.clear();
        let graph = doc.into_graph().unwrap();
        let node = graph.node(NodeId(2)).unwrap();
        assert_eq!(node.inputs[0].link, Some(LinkId(7)));
        assert!(!graph.input_is_live(NodeId(2), 0));
    }

    #[test]
    fn duplicate_node_ids_are_rejected() {
        let mut doc = Workflow::from_json(SAVED).unwrap();
        let copy = doc.nodes[0].clone();
        doc.nodes.push(copy);
        assert!(matches!(
            doc.into_graph(),
            Err(CoreError::DuplicateNode { id }) if id == NodeId(1)
        ));
    }

    #[test]
    fn graph_saves_back_to_same_document() {
        let doc = Workflow::from_json(SAVED).unwrap();
        let graph = doc.clone().into_graph().unwrap();
        let saved = Workflow::from(&graph);
        assert_eq!(saved, doc);
    }

    #[test]
    fn malformed_document_is_a_serialization_error() {
        assert!(matches!(
            Workflow::from_json("{ \"nodes\": 3 }"),
            Err(CoreError::Serialization(_))
        ));
    }
}
