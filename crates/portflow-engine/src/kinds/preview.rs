//! Preview nodes: a growing list of typed inputs plus the items shown after
//! the last execution.

use portflow_core::{NodeId, SlotType};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::kinds::{write_row, PassContext, SlotBehavior};
use crate::labels::{self, DefaultLabels};
use crate::normalize::{self, NormalizePlan, SlotBounds, SlotLayout};
use crate::resolve;
use crate::settings::EngineSettings;

const DEFAULTS: DefaultLabels<'static> = DefaultLabels {
    input: "input",
    output: "output",
};

// ---------------------------------------------------------------------------
// Execution output
// ---------------------------------------------------------------------------

fn default_folder_type() -> String {
    "output".to_string()
}

/// One saved image reported by an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(rename = "type", default = "default_folder_type")]
    pub folder_type: String,
    #[serde(default)]
    pub slot: usize,
}

/// One text value reported by an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEntry {
    pub text: String,
    #[serde(default)]
    pub slot: usize,
}

/// The execution message a preview node receives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewMessage {
    #[serde(default)]
    pub preview_data: Vec<ImageEntry>,
    #[serde(default)]
    pub text_data: Vec<TextEntry>,
}

/// A displayable preview item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PreviewItem {
    Image {
        slot: usize,
        filename: String,
        subfolder: String,
        folder_type: String,
    },
    Text {
        slot: usize,
        text: String,
    },
}

impl PreviewItem {
    pub fn slot(&self) -> usize {
        match self {
            PreviewItem::Image { slot, .. } | PreviewItem::Text { slot, .. } => *slot,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            PreviewItem::Image { .. } => 0,
            PreviewItem::Text { .. } => 1,
        }
    }
}

/// Items from the last execution and the one currently selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewState {
    items: Vec<PreviewItem>,
    current: usize,
}

impl PreviewState {
    /// Replaces the items with those in `message`, ordered by slot with
    /// images ahead of texts, keeping the selection in range.
    pub fn record(&mut self, message: PreviewMessage) {
        let images = message.preview_data.into_iter().map(|e| PreviewItem::Image {
            slot: e.slot,
            filename: e.filename,
            subfolder: e.subfolder,
            folder_type: e.folder_type,
        });
        let texts = message
            .text_data
            .into_iter()
            .map(|e| PreviewItem::Text { slot: e.slot, text: e.text });
        let mut items: Vec<PreviewItem> = images.chain(texts).collect();
        // Stable: arrival order is kept within one slot and kind.
        items.sort_by_key(|item| (item.slot(), item.rank()));
        self.items = items;
        self.current = self.current.min(self.items.len().saturating_sub(1));
    }

    /// Selects item `index`. Out-of-range indices are ignored.
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.items.len() {
            self.current = index;
            true
        } else {
            false
        }
    }

    pub fn current(&self) -> Option<&PreviewItem> {
        self.items.get(self.current)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn items(&self) -> &[PreviewItem] {
        &self.items
    }

    pub fn reset(&mut self) {
        self.items.clear();
        self.current = 0;
    }
}

// ---------------------------------------------------------------------------
// Behavior
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PreviewNode {
    rebuilt: bool,
    state: PreviewState,
}

impl PreviewNode {
    pub fn state(&self) -> &PreviewState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut PreviewState {
        &mut self.state
    }
}

impl SlotBehavior for PreviewNode {
    fn plan(&self, settings: &EngineSettings) -> NormalizePlan<'_> {
        NormalizePlan {
            bounds: SlotBounds {
                min: 1,
                max: settings.max_slots,
                first_dynamic: 0,
            },
            layout: SlotLayout::InputsOnly,
            defaults: DEFAULTS,
        }
    }

    fn normalize(&mut self, cx: &mut PassContext<'_>) -> Result<(), EngineError> {
        if !self.rebuilt {
            self.rebuilt = true;
            if normalize::clear_unwired_inputs(cx.graph, cx.node)? {
                tracing::debug!(node = %cx.node, "rebuilding preview inputs");
            }
        }
        let plan = self.plan(cx.settings);
        let changes = normalize::normalize(cx.graph, cx.node, &plan, cx.connectivity)?;
        cx.changes.extend(changes);
        Ok(())
    }

    fn resolve_types(&mut self, cx: &mut PassContext<'_>) -> Result<Vec<SlotType>, EngineError> {
        let rows = cx.node()?.inputs.len();
        Ok((0..rows)
            .map(|slot| resolve::resolve_input_type(cx.graph, cx.node, slot))
            .collect())
    }

    fn assign_labels(&mut self, cx: &mut PassContext<'_>, types: &[SlotType]) -> Result<(), EngineError> {
        let text = labels::assign_labels(types, DEFAULTS);
        for (slot, (ty, text)) in types.iter().zip(&text).enumerate() {
            write_row(cx, slot, ty, text, SlotLayout::InputsOnly)?;
        }
        Ok(())
    }

    fn finish(&mut self, cx: &mut PassContext<'_>) -> Result<Vec<NodeId>, EngineError> {
        let rows = cx.node()?.inputs.len();
        let any_live = (0..rows).any(|slot| cx.input_connected(slot));
        if !any_live && !self.state.items.is_empty() {
            tracing::debug!(node = %cx.node, "clearing preview items");
            self.state.reset();
        }
        Ok(Vec::new())
    }

    fn grow_only(&self) -> bool {
        true
    }
}
