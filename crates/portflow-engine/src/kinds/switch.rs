//! Switch nodes: a growing list of alternative inputs feeding fixed outputs.
//!
//! The first concrete input type becomes the switch type. Untyped inputs
//! adopt it, and every output carries it.

use portflow_core::SlotType;

use crate::error::EngineError;
use crate::kinds::{write_row, PassContext, SlotBehavior};
use crate::labels::{self, DefaultLabels, OccurrenceCounter, SlotText};
use crate::normalize::{NormalizePlan, SlotBounds, SlotLayout};
use crate::resolve;
use crate::settings::EngineSettings;

#[derive(Debug, Clone)]
pub struct SwitchNode {
    prefix: String,
    batch: bool,
    resolved: SlotType,
}

impl SwitchNode {
    pub fn new(prefix: &str, batch: bool) -> Self {
        SwitchNode {
            prefix: prefix.to_string(),
            batch,
            resolved: SlotType::Any,
        }
    }

    /// Word used to label untyped inputs.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_batch(&self) -> bool {
        self.batch
    }

    /// Switch type as of the last pass.
    pub fn resolved_type(&self) -> &SlotType {
        &self.resolved
    }

    fn defaults(&self) -> DefaultLabels<'_> {
        DefaultLabels {
            input: &self.prefix,
            output: "output",
        }
    }
}

impl SlotBehavior for SwitchNode {
    fn plan(&self, settings: &EngineSettings) -> NormalizePlan<'_> {
        NormalizePlan {
            bounds: SlotBounds {
                min: 1,
                max: settings.max_slots,
                first_dynamic: 0,
            },
            layout: SlotLayout::InputsOnly,
            defaults: self.defaults(),
        }
    }

    fn resolve_types(&mut self, cx: &mut PassContext<'_>) -> Result<Vec<SlotType>, EngineError> {
        let rows = cx.node()?.inputs.len();
        let own: Vec<SlotType> = (0..rows)
            .map(|slot| resolve::resolve_input_type(cx.graph, cx.node, slot))
            .collect();
        self.resolved = own.iter().find(|t| t.is_concrete()).cloned().unwrap_or_default();
        Ok(own
            .into_iter()
            .map(|ty| ty.or(self.resolved.clone()))
            .collect())
    }

    fn assign_labels(&mut self, cx: &mut PassContext<'_>, types: &[SlotType]) -> Result<(), EngineError> {
        let defaults = self.defaults();
        let mut counter = OccurrenceCounter::new();
        for (slot, ty) in types.iter().enumerate() {
            let (input_label, _) = labels::label_pair(&mut counter, ty, defaults);
            let text = SlotText {
                input_name: labels::slot_name("input", slot),
                output_name: String::new(),
                input_label,
                output_label: String::new(),
            };
            write_row(cx, slot, ty, &text, SlotLayout::InputsOnly)?;
        }

        let resolved = self.resolved.clone();
        let outputs = cx.node()?.outputs.len();
        let node = cx.node_mut()?;
        for output in &mut node.outputs {
            output.ty = resolved.clone();
            if let Some(label) = resolved.label_base() {
                output.name = labels::slot_name("output", 0);
                output.label = label;
            }
        }
        for slot in 0..outputs {
            resolve::update_output_link_types(cx.graph, cx.node, slot, &resolved);
        }
        Ok(())
    }
}

/// Label prefix for a switch definition: the lowest-numbered input name
/// with its trailing number stripped (`image_1` gives `image`).
pub fn derive_input_prefix(names: &[&str]) -> Option<String> {
    let first = names
        .iter()
        .filter(|n| !n.is_empty())
        .min_by_key(|n| trailing_number(n).unwrap_or(u32::MAX))?;
    let digits = first.len() - first.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    let stem = &first[..first.len() - digits];
    let stem = stem.strip_suffix('_').unwrap_or(stem);
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

fn trailing_number(name: &str) -> Option<u32> {
    let stem = name.trim_end_matches(|c: char| c.is_ascii_digit());
    name[stem.len()..].parse().ok()
}
