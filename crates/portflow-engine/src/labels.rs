//! Port names and display labels.
//!
//! Names are positional machine identifiers (`input_3`). Labels are derived
//! from resolved types: the first `IMAGE` port is `image`, the next `image_2`,
//! and so on, with a separate counter for untyped ports that use the node
//! kind's default words instead.

use std::collections::HashMap;

use portflow_core::SlotType;

/// Default words for untyped ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultLabels<'a> {
    pub input: &'a str,
    pub output: &'a str,
}

impl DefaultLabels<'static> {
    pub const PAIRED: DefaultLabels<'static> = DefaultLabels {
        input: "input",
        output: "output",
    };
}

/// Occurrence counters keyed by type, plus one shared counter for untyped
/// ports.
#[derive(Debug, Default)]
pub struct OccurrenceCounter {
    counts: HashMap<SlotType, usize>,
}

impl OccurrenceCounter {
    pub fn new() -> Self {
        OccurrenceCounter::default()
    }

    /// Records one more occurrence of `ty` and returns its 1-based ordinal.
    pub fn next(&mut self, ty: &SlotType) -> usize {
        let count = self.counts.entry(ty.clone()).or_insert(0);
        *count += 1;
        *count
    }
}

/// `base` for the first occurrence, `base_N` for the Nth.
pub fn numbered(base: &str, occurrence: usize) -> String {
    if occurrence <= 1 {
        base.to_string()
    } else {
        format!("{base}_{occurrence}")
    }
}

/// Positional slot name, `prefix_{index + 1}`.
pub fn slot_name(prefix: &str, index: usize) -> String {
    format!("{prefix}_{}", index + 1)
}

/// Names and labels for one slot row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotText {
    pub input_name: String,
    pub output_name: String,
    pub input_label: String,
    pub output_label: String,
}

/// Labels for one row given its type and the counter state so far.
pub fn label_pair(counter: &mut OccurrenceCounter, ty: &SlotType, defaults: DefaultLabels<'_>) -> (String, String) {
    let occurrence = counter.next(ty);
    match ty.label_base() {
        Some(base) => {
            let label = numbered(&base, occurrence);
            (label.clone(), label)
        }
        None => (
            numbered(defaults.input, occurrence),
            numbered(defaults.output, occurrence),
        ),
    }
}

/// Assigns names and labels to rows in index order.
pub fn assign_labels(types: &[SlotType], defaults: DefaultLabels<'_>) -> Vec<SlotText> {
    let mut counter = OccurrenceCounter::new();
    types
        .iter()
        .enumerate()
        .map(|(index, ty)| {
            let (input_label, output_label) = label_pair(&mut counter, ty, defaults);
            SlotText {
                input_name: slot_name("input", index),
                output_name: slot_name("output", index),
                input_label,
                output_label,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(tags: &[&str]) -> Vec<SlotType> {
        tags.iter().map(|t| SlotType::from(*t)).collect()
    }

    #[test]
    fn repeated_types_are_numbered_in_order() {
        let text = assign_labels(&types(&["IMAGE", "MASK", "IMAGE", "IMAGE"]), DefaultLabels::PAIRED);
        let labels: Vec<_> = text.iter().map(|t| t.input_label.as_str()).collect();
        assert_eq!(labels, ["image", "mask", "image_2", "image_3"]);
    }

    #[test]
    fn untyped_rows_use_default_words() {
        let text = assign_labels(&types(&["*", "LATENT", "*"]), DefaultLabels::PAIRED);
        assert_eq!(text[0].input_label, "input");
        assert_eq!(text[0].output_label, "output");
        assert_eq!(text[1].output_label, "latent");
        assert_eq!(text[2].input_label, "input_2");
        assert_eq!(text[2].output_label, "output_2");
    }

    #[test]
    fn names_are_positional() {
        let text = assign_labels(&types(&["IMAGE", "*"]), DefaultLabels::PAIRED);
        assert_eq!(text[0].input_name, "input_1");
        assert_eq!(text[1].output_name, "output_2");
    }

    #[test]
    fn custom_defaults() {
        let defaults = DefaultLabels { input: "image", output: "output" };
        let text = assign_labels(&types(&["*", "*"]), defaults);
        assert_eq!(text[1].input_label, "image_2");
    }

    #[test]
    fn numbered_leaves_first_occurrence_bare() {
        assert_eq!(numbered("mask", 1), "mask");
        assert_eq!(numbered("mask", 2), "mask_2");
        assert_eq!(numbered("mask", 0), "mask");
    }
}
