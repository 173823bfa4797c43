//! Single and Any nodes: one fixed pair named after its type.

use portflow_core::{SlotSide, SlotType};

use crate::error::EngineError;
use crate::kinds::{write_row, PassContext, SlotBehavior};
use crate::labels::{DefaultLabels, SlotText};
use crate::normalize::{NormalizePlan, SlotBounds, SlotLayout};
use crate::resolve;
use crate::settings::EngineSettings;

#[derive(Debug, Clone, Default)]
pub struct SingleNode;

impl SlotBehavior for SingleNode {
    fn plan(&self, _settings: &EngineSettings) -> NormalizePlan<'_> {
        NormalizePlan {
            bounds: SlotBounds {
                min: 1,
                max: 1,
                first_dynamic: 0,
            },
            layout: SlotLayout::Paired,
            defaults: DefaultLabels::PAIRED,
        }
    }

    fn resolve_types(&mut self, cx: &mut PassContext<'_>) -> Result<Vec<SlotType>, EngineError> {
        Ok(vec![resolve::resolve_connected_type(cx.graph, cx.node, 0)])
    }

    fn assign_labels(&mut self, cx: &mut PassContext<'_>, types: &[SlotType]) -> Result<(), EngineError> {
        let Some(ty) = types.first() else {
            return Ok(());
        };
        let text = match ty.label_base() {
            Some(base) => SlotText {
                input_name: base.clone(),
                output_name: base.clone(),
                input_label: base.clone(),
                output_label: base,
            },
            None => SlotText {
                input_name: "input".to_string(),
                output_name: "output".to_string(),
                input_label: "input".to_string(),
                output_label: "output".to_string(),
            },
        };
        write_row(cx, 0, ty, &text, SlotLayout::Paired)
    }

    fn compact_gap(&mut self, _cx: &mut PassContext<'_>, _side: SlotSide, _slot: usize) -> Result<bool, EngineError> {
        Ok(false)
    }
}
