//! Property tests: arbitrary connect/disconnect sequences against a
//! passthrough node always settle into a compact, consistently labelled
//! layout.

use std::collections::HashMap;

use portflow_core::{NodeId, SlotType};
use portflow_engine::Editor;
use proptest::prelude::*;

const TAGS: [&str; 4] = ["IMAGE", "MASK", "IMAGE", "LATENT"];

#[derive(Debug, Clone)]
enum Op {
    /// Source output, target row (taken modulo the row count).
    Connect(usize, usize),
    /// Target row (taken modulo the row count).
    Disconnect(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..TAGS.len(), 0..16usize).prop_map(|(from, to)| Op::Connect(from, to)),
        1 => (0..16usize).prop_map(Op::Disconnect),
    ]
}

fn setup() -> (Editor, NodeId, NodeId) {
    let mut editor = Editor::default();
    let outputs: Vec<(&str, SlotType)> = TAGS.iter().map(|t| (*t, SlotType::from(*t))).collect();
    let src = editor.add_plain_node("Source", &[], &outputs).unwrap();
    let node = editor.add_node("PT_DynamicPassthrough").unwrap();
    editor.settle();
    (editor, src, node)
}

fn apply(editor: &mut Editor, src: NodeId, node: NodeId, op: &Op) {
    let rows = editor.graph().node(node).unwrap().inputs.len();
    match *op {
        Op::Connect(from, to) => {
            editor.connect(src, from, node, to % rows).unwrap();
        }
        Op::Disconnect(at) => {
            editor.disconnect_input(node, at % rows).unwrap();
        }
    }
    editor.settle();
}

/// Labels the rows should carry given their types.
fn expected_labels(types: &[SlotType]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    types
        .iter()
        .map(|ty| match ty.label_base() {
            Some(base) => {
                let n = seen.entry(base.clone()).or_insert(0);
                *n += 1;
                if *n == 1 {
                    base
                } else {
                    format!("{base}_{n}")
                }
            }
            None => "input".to_string(),
        })
        .collect()
}

proptest! {
    #[test]
    fn layout_stays_compact_and_labelled(ops in prop::collection::vec(op(), 0..20)) {
        let (mut editor, src, node) = setup();
        for op in &ops {
            apply(&mut editor, src, node, op);
        }

        let graph = editor.graph();
        let n = graph.node(node).unwrap();
        prop_assert!(!n.inputs.is_empty());
        prop_assert_eq!(n.inputs.len(), n.outputs.len());

        let last = n.inputs.len() - 1;
        for slot in 0..last {
            prop_assert!(graph.input_is_live(node, slot), "row {} is a gap", slot);
            prop_assert!(n.inputs[slot].ty.is_concrete());
        }
        prop_assert!(!graph.input_is_live(node, last));
        prop_assert!(n.inputs[last].ty.is_any());

        let types: Vec<SlotType> = n.inputs.iter().map(|s| s.ty.clone()).collect();
        let labels: Vec<String> = n.inputs.iter().map(|s| s.label.clone()).collect();
        prop_assert_eq!(labels, expected_labels(&types));

        for (slot, input) in n.inputs.iter().enumerate() {
            prop_assert_eq!(&n.outputs[slot].ty, &input.ty);
            if let Some(link) = graph.live_input_link(node, slot) {
                prop_assert_eq!(&link.ty, &input.ty);
            }
        }
    }

    #[test]
    fn another_pass_changes_nothing(ops in prop::collection::vec(op(), 0..12)) {
        let (mut editor, src, node) = setup();
        for op in &ops {
            apply(&mut editor, src, node, op);
        }
        let before = editor.graph().node(node).unwrap().clone();
        editor.request_sync(node).unwrap();
        editor.settle();
        let after = editor.graph().node(node).unwrap();
        prop_assert_eq!(&before.inputs, &after.inputs);
        prop_assert_eq!(&before.outputs, &after.outputs);
    }
}
