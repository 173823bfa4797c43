//! Passthrough: paired input/output rows, each typed by whatever flows
//! through it.

use portflow_core::SlotType;

use crate::error::EngineError;
use crate::kinds::{write_row, PassContext, SlotBehavior};
use crate::labels::{self, DefaultLabels};
use crate::normalize::{NormalizePlan, SlotBounds, SlotLayout};
use crate::resolve;
use crate::settings::EngineSettings;

#[derive(Debug, Clone, Default)]
pub struct PassthroughNode;

impl SlotBehavior for PassthroughNode {
    fn plan(&self, settings: &EngineSettings) -> NormalizePlan<'_> {
        NormalizePlan {
            bounds: SlotBounds {
                min: 1,
                max: settings.max_slots,
                first_dynamic: 0,
            },
            layout: SlotLayout::Paired,
            defaults: DefaultLabels::PAIRED,
        }
    }

    fn resolve_types(&mut self, cx: &mut PassContext<'_>) -> Result<Vec<SlotType>, EngineError> {
        let rows = cx.node()?.slot_count();
        Ok((0..rows)
            .map(|slot| resolve::resolve_pair_type(cx.graph, cx.node, slot))
            .collect())
    }

    fn assign_labels(&mut self, cx: &mut PassContext<'_>, types: &[SlotType]) -> Result<(), EngineError> {
        let text = labels::assign_labels(types, DefaultLabels::PAIRED);
        for (slot, (ty, text)) in types.iter().zip(&text).enumerate() {
            write_row(cx, slot, ty, text, SlotLayout::Paired)?;
        }
        Ok(())
    }
}
