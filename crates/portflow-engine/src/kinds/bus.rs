//! Bus nodes.
//!
//! Slot 0 is the reserved bus pair. Every other row is a data channel whose
//! type comes from its own connections, from the persisted summary during a
//! load, or from the upstream bus. Each pass merges the upstream channel map
//! with the local channels and publishes the result for the next bus.

use portflow_core::{NodeId, SlotType};

use crate::bus::{
    self, ChannelMap, LocalChannel, MergeOutcome, OutputHint, BUS_SLOT_NAME, BUS_TYPES_PROPERTY,
    OUTPUT_HINTS_WIDGET, OVERWRITE_WIDGET, SLOT_TYPES_WIDGET,
};
use crate::error::EngineError;
use crate::kinds::{write_row, PassContext, SlotBehavior};
use crate::labels::{self, DefaultLabels, OccurrenceCounter, SlotText};
use crate::normalize::{self, Connectivity, NormalizePlan, SlotBounds, SlotLayout};
use crate::resolve;
use crate::settings::EngineSettings;

/// Where the upstream map came from on the current pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum Upstream {
    #[default]
    None,
    Known(ChannelMap),
    /// The bus input names a link that is not in the graph yet.
    Pending,
}

impl Upstream {
    fn map(&self) -> Option<&ChannelMap> {
        match self {
            Upstream::Known(map) => Some(map),
            Upstream::None | Upstream::Pending => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BusNode {
    upstream: Upstream,
    locals: Vec<LocalChannel>,
    merged: Option<MergeOutcome>,
    changed: bool,
}

impl BusNode {
    /// Outcome of the most recent merge.
    pub fn last_merge(&self) -> Option<&MergeOutcome> {
        self.merged.as_ref()
    }

    fn read_upstream(cx: &mut PassContext<'_>) -> Result<Upstream, EngineError> {
        let Some(id) = cx.node()?.inputs.first().and_then(|s| s.link) else {
            return Ok(Upstream::None);
        };
        let origin = match cx.connectivity {
            Connectivity::Live => cx.graph.live_input_link(cx.node, 0).map(|l| l.origin),
            Connectivity::Declared => cx.graph.link(id).map(|l| l.origin),
        };
        let Some(origin) = origin else {
            if cx.connectivity == Connectivity::Declared {
                return Ok(Upstream::Pending);
            }
            tracing::warn!(node = %cx.node, link = %id, "clearing stale bus link");
            if let Some(input) = cx.node_mut()?.inputs.first_mut() {
                input.link = None;
            }
            return Ok(Upstream::None);
        };
        let map = cx
            .graph
            .node(origin)
            .and_then(|n| n.property(BUS_TYPES_PROPERTY))
            .map(ChannelMap::from_property)
            .unwrap_or_default();
        Ok(Upstream::Known(map))
    }

    fn ensure_bus_slot(cx: &mut PassContext<'_>) -> Result<(), EngineError> {
        let node = cx.node()?;
        let (needs_input, needs_output) = (node.inputs.is_empty(), node.outputs.is_empty());
        if needs_input {
            cx.graph.add_input(cx.node, BUS_SLOT_NAME, SlotType::bus())?;
        }
        if needs_output {
            cx.graph.add_output(cx.node, BUS_SLOT_NAME, SlotType::bus())?;
        }
        let node = cx.node_mut()?;
        if let Some(input) = node.inputs.first_mut() {
            input.name = BUS_SLOT_NAME.to_string();
            input.label = BUS_SLOT_NAME.to_string();
            input.ty = SlotType::bus();
        }
        if let Some(output) = node.outputs.first_mut() {
            output.name = BUS_SLOT_NAME.to_string();
            output.label = BUS_SLOT_NAME.to_string();
            output.ty = SlotType::bus();
        }
        Ok(())
    }

    fn local_type(&self, cx: &PassContext<'_>, slot: usize, summary: &[(usize, SlotType)]) -> SlotType {
        let ty = resolve::resolve_connected_type(cx.graph, cx.node, slot);
        if ty.is_concrete() {
            return ty;
        }
        if cx.connectivity == Connectivity::Declared {
            if let Some((_, saved)) = summary.iter().find(|(s, t)| *s == slot && t.is_concrete()) {
                return saved.clone();
            }
        }
        self.upstream
            .map()
            .and_then(|map| map.get((slot - 1) as u32))
            .cloned()
            .unwrap_or_default()
    }

    /// The output-only row that forwards upstream `channel` unchanged: the
    /// row one past the channel index, carrying the channel's type.
    fn mirrored_slot(cx: &PassContext<'_>, channel: u32, ty: &SlotType, types: &[SlotType]) -> Option<usize> {
        let slot = channel as usize + 1;
        let forwards = types.get(slot) == Some(ty) && !cx.input_connected(slot) && cx.output_connected(slot);
        forwards.then_some(slot)
    }

    fn row_text(slot: usize, input_label: String, output_label: String) -> SlotText {
        SlotText {
            input_name: format!("input_{slot}"),
            output_name: format!("output_{slot}"),
            input_label,
            output_label,
        }
    }
}

impl SlotBehavior for BusNode {
    fn plan(&self, settings: &EngineSettings) -> NormalizePlan<'_> {
        NormalizePlan {
            bounds: SlotBounds {
                min: 2,
                max: settings.max_slots,
                first_dynamic: 1,
            },
            layout: SlotLayout::Paired,
            defaults: DefaultLabels::PAIRED,
        }
    }

    fn normalize(&mut self, cx: &mut PassContext<'_>) -> Result<(), EngineError> {
        Self::ensure_bus_slot(cx)?;
        self.upstream = Self::read_upstream(cx)?;
        let plan = self.plan(cx.settings);
        let changes = normalize::normalize(cx.graph, cx.node, &plan, cx.connectivity)?;
        cx.changes.extend(changes);
        Ok(())
    }

    fn resolve_types(&mut self, cx: &mut PassContext<'_>) -> Result<Vec<SlotType>, EngineError> {
        let node = cx.node()?;
        let rows = node.slot_count();
        let summary = node
            .widget(SLOT_TYPES_WIDGET)
            .map(bus::decode_slot_types)
            .unwrap_or_default();

        let mut types = vec![SlotType::bus()];
        self.locals.clear();
        for slot in 1..rows {
            let has_input = cx.input_connected(slot);
            if !has_input && !cx.output_connected(slot) {
                types.push(SlotType::Any);
                continue;
            }
            let ty = self.local_type(cx, slot, &summary);
            if has_input {
                self.locals.push(LocalChannel { slot, ty: ty.clone() });
            }
            types.push(ty);
        }
        Ok(types)
    }

    fn assign_labels(&mut self, cx: &mut PassContext<'_>, types: &[SlotType]) -> Result<(), EngineError> {
        let upstream = self.upstream.map().cloned().unwrap_or_default();
        let outcome = bus::merge_channels(&upstream, &self.locals, cx.settings.bus_overwrite);

        // Channel order first, so a slot's label matches its position on the bus.
        let mut counter = OccurrenceCounter::new();
        let mut text: Vec<Option<SlotText>> = vec![None; types.len()];
        for (channel, ty) in outcome.combined.iter() {
            let pair = labels::label_pair(&mut counter, ty, DefaultLabels::PAIRED);
            let slot = outcome
                .slot_for_channel(channel)
                .or_else(|| Self::mirrored_slot(cx, channel, ty, types));
            if let Some(slot) = slot {
                if let Some(entry) = text.get_mut(slot) {
                    *entry = Some(Self::row_text(slot, pair.0, pair.1));
                }
            }
        }
        for slot in 1..types.len() {
            if text[slot].is_some() {
                continue;
            }
            let (input_label, output_label) = if cx.input_connected(slot) || cx.output_connected(slot) {
                labels::label_pair(&mut counter, &types[slot], DefaultLabels::PAIRED)
            } else {
                ("input".to_string(), "output".to_string())
            };
            text[slot] = Some(Self::row_text(slot, input_label, output_label));
        }

        for (slot, entry) in text.into_iter().enumerate().skip(1) {
            if let Some(row) = entry {
                write_row(cx, slot, &types[slot], &row, SlotLayout::Paired)?;
            }
        }
        resolve::update_link_types_for_slot(cx.graph, cx.node, 0, &SlotType::bus());

        let hints: Vec<OutputHint> = (1..types.len())
            .filter(|&slot| cx.output_connected(slot))
            .map(|slot| OutputHint {
                slot,
                ty: types[slot].clone(),
                has_local_input: cx.input_connected(slot),
            })
            .collect();
        let slot_types: Vec<(usize, SlotType)> = self.locals.iter().map(|l| (l.slot, l.ty.clone())).collect();
        let overwrite = cx.settings.bus_overwrite;
        let publish = !matches!(self.upstream, Upstream::Pending);
        let id = cx.node;

        let node = cx.node_mut()?;
        node.set_widget(SLOT_TYPES_WIDGET, bus::encode_slot_types(&slot_types));
        node.set_widget(OUTPUT_HINTS_WIDGET, bus::encode_output_hints(&hints));
        node.set_widget(OVERWRITE_WIDGET, bus::encode_flag(overwrite));

        self.changed = false;
        if publish {
            let value = outcome.combined.to_property();
            self.changed = node.property(BUS_TYPES_PROPERTY) != Some(&value);
            node.set_property(BUS_TYPES_PROPERTY, value);
            tracing::debug!(node = %id, channels = %outcome.combined, "published bus channels");
        } else {
            tracing::debug!(node = %id, "upstream bus not wired yet, keeping saved channels");
        }
        self.merged = Some(outcome);
        Ok(())
    }

    fn finish(&mut self, cx: &mut PassContext<'_>) -> Result<Vec<NodeId>, EngineError> {
        if !std::mem::take(&mut self.changed) {
            return Ok(Vec::new());
        }
        let mut targets: Vec<NodeId> = cx
            .graph
            .live_output_links(cx.node, 0)
            .into_iter()
            .map(|link| link.target)
            .collect();
        targets.sort();
        targets.dedup();
        Ok(targets)
    }
}
