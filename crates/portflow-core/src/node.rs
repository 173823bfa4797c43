//! Host nodes.
//!
//! A [`Node`] owns its port arrays plus two persisted maps: free-form JSON
//! `properties` and string-valued `widgets`. Everything the engine keeps
//! across save/load lives in one of those two maps.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::id::NodeId;
use crate::slot::{InputSlot, OutputSlot};

/// Height of one port row.
pub const SLOT_HEIGHT: f32 = 20.0;

/// Vertical padding below the last row.
pub const SLOT_PADDING: f32 = 6.0;

/// Narrowest width a node is ever computed at.
pub const MIN_WIDTH: f32 = 140.0;

/// Approximate width of one label character.
pub const CHAR_WIDTH: f32 = 7.0;

/// Horizontal space reserved for the two port dots and the gutter.
const GUTTER_WIDTH: f32 = 40.0;

/// A node in the host graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Registered node type, e.g. `PT_DynamicBus`.
    #[serde(rename = "type")]
    pub class_type: String,
    #[serde(default)]
    pub inputs: Vec<InputSlot>,
    #[serde(default)]
    pub outputs: Vec<OutputSlot>,
    #[serde(default)]
    pub properties: IndexMap<String, serde_json::Value>,
    #[serde(default)]
    pub widgets: IndexMap<String, String>,
    #[serde(default)]
    pub size: [f32; 2],
}

impl Node {
    /// Creates a node with no ports.
    pub fn new(id: NodeId, class_type: impl Into<String>) -> Self {
        Node {
            id,
            class_type: class_type.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            properties: IndexMap::new(),
            widgets: IndexMap::new(),
            size: [0.0, 0.0],
        }
    }

    /// Number of port rows: the longer of the two arrays.
    pub fn slot_count(&self) -> usize {
        self.inputs.len().max(self.outputs.len())
    }

    /// Highest input index at or after `from` holding a recorded link id.
    pub fn last_declared_input(&self, from: usize) -> Option<usize> {
        (from..self.inputs.len())
            .rev()
            .find(|&i| self.inputs[i].link.is_some())
    }

    /// Highest output index at or after `from` holding any recorded link id.
    pub fn last_declared_output(&self, from: usize) -> Option<usize> {
        (from..self.outputs.len())
            .rev()
            .find(|&i| !self.outputs[i].links.is_empty())
    }

    pub fn widget(&self, key: &str) -> Option<&str> {
        self.widgets.get(key).map(String::as_str)
    }

    pub fn set_widget(&mut self, key: &str, value: impl Into<String>) {
        self.widgets.insert(key.to_string(), value.into());
    }

    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }

    pub fn set_property(&mut self, key: &str, value: serde_json::Value) {
        self.properties.insert(key.to_string(), value);
    }

    /// Size the node needs to show every port row and label.
    pub fn compute_size(&self) -> [f32; 2] {
        let rows = self.slot_count().max(1) as f32;
        let widest_input = self
            .inputs
            .iter()
            .map(|s| s.display_text().chars().count())
            .max()
            .unwrap_or(0);
        let widest_output = self
            .outputs
            .iter()
            .map(|s| s.display_text().chars().count())
            .max()
            .unwrap_or(0);
        let text = (widest_input + widest_output) as f32 * CHAR_WIDTH;
        [
            MIN_WIDTH.max(text + GUTTER_WIDTH),
            rows * SLOT_HEIGHT + SLOT_PADDING,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::LinkId;
    use crate::slot_type::SlotType;

    fn node_with_ports(inputs: usize, outputs: usize) -> Node {
        let mut node = Node::new(NodeId(1), "PT_DynamicPassthrough");
        for i in 0..inputs {
            node.inputs
                .push(InputSlot::new(format!("input_{}", i + 1), SlotType::Any));
        }
        for i in 0..outputs {
            node.outputs
                .push(OutputSlot::new(format!("output_{}", i + 1), SlotType::Any));
        }
        node
    }

    #[test]
    fn slot_count_is_longer_side() {
        assert_eq!(node_with_ports(3, 1).slot_count(), 3);
        assert_eq!(node_with_ports(0, 2).slot_count(), 2);
    }

    #[test]
    fn last_declared_ports_respect_start() {
        let mut node = node_with_ports(4, 4);
        node.inputs[2].link = Some(LinkId(1));
        node.outputs[0].links.push(LinkId(2));
        assert_eq!(node.last_declared_input(0), Some(2));
        assert_eq!(node.last_declared_input(3), None);
        assert_eq!(node.last_declared_output(0), Some(0));
        assert_eq!(node.last_declared_output(1), None);
    }

    #[test]
    fn compute_size_grows_with_rows() {
        let small = node_with_ports(1, 1).compute_size();
        let large = node_with_ports(5, 5).compute_size();
        assert_eq!(small[1], SLOT_HEIGHT + SLOT_PADDING);
        assert_eq!(large[1], 5.0 * SLOT_HEIGHT + SLOT_PADDING);
        assert!(small[0] >= MIN_WIDTH);
    }

    #[test]
    fn compute_size_widens_for_long_labels() {
        let mut node = node_with_ports(1, 1);
        node.inputs[0].label = "a_really_long_input_label".into();
        node.outputs[0].label = "a_really_long_output_label".into();
        assert!(node.compute_size()[0] > MIN_WIDTH);
    }

    #[test]
    fn widgets_and_properties_roundtrip_through_json() {
        let mut node = node_with_ports(1, 1);
        node.set_widget("_overwrite_mode", "1");
        node.set_property("_bus_slot_types", serde_json::json!({"0": "MASK"}));
        let json = serde_json::to_string(&node).unwrap();
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(back.widget("_overwrite_mode"), Some("1"));
        assert_eq!(back.property("_bus_slot_types").unwrap()["0"], "MASK");
        assert_eq!(back.class_type, "PT_DynamicPassthrough");
    }
}
