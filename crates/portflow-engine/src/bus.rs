//! Bus channel maps.
//!
//! A bus node carries a sparse map from channel index to type through its
//! reserved slot 0. Each bus node merges the map published by its upstream
//! bus with its own locally connected channels and publishes the result in
//! its properties for the next bus downstream.
//!
//! Besides the map itself, a bus node keeps three widget strings as
//! write-through caches for the save file:
//! - `_slot_types`: `slot:type` for every locally input-connected slot
//! - `_output_hints`: `slot:type:hasLocalInput` for every output-connected slot
//! - `_overwrite_mode`: `1` or `0`

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use portflow_core::SlotType;

/// Property holding the published channel map.
pub const BUS_TYPES_PROPERTY: &str = "_bus_slot_types";

/// Widget caching local slot types.
pub const SLOT_TYPES_WIDGET: &str = "_slot_types";

/// Widget caching output-side expectations.
pub const OUTPUT_HINTS_WIDGET: &str = "_output_hints";

/// Widget mirroring the overwrite setting.
pub const OVERWRITE_WIDGET: &str = "_overwrite_mode";

/// Name and label of the reserved bus slot.
pub const BUS_SLOT_NAME: &str = "bus";

// ---------------------------------------------------------------------------
// Channel map
// ---------------------------------------------------------------------------

/// Sparse channel index to type map. Serializes as a JSON object with
/// stringified integer keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelMap(BTreeMap<u32, SlotType>);

impl ChannelMap {
    pub fn new() -> Self {
        ChannelMap::default()
    }

    pub fn get(&self, channel: u32) -> Option<&SlotType> {
        self.0.get(&channel)
    }

    pub fn insert(&mut self, channel: u32, ty: SlotType) {
        self.0.insert(channel, ty);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in channel order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &SlotType)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    /// One past the highest channel index, or 0 for an empty map.
    pub fn next_index(&self) -> u32 {
        self.0.keys().next_back().map_or(0, |k| k + 1)
    }

    /// Lowest channel of type `ty` not already in `claimed`.
    pub fn first_unclaimed_match(&self, ty: &SlotType, claimed: &BTreeSet<u32>) -> Option<u32> {
        self.0
            .iter()
            .find(|(k, v)| *v == ty && !claimed.contains(*k))
            .map(|(k, _)| *k)
    }

    /// Reads a published map. Malformed entries are skipped; anything that
    /// is not an object reads as empty.
    pub fn from_property(value: &serde_json::Value) -> ChannelMap {
        let Some(object) = value.as_object() else {
            return ChannelMap::new();
        };
        let entries = object.iter().filter_map(|(key, ty)| {
            let channel = key.trim().parse::<u32>().ok()?;
            let tag = ty.as_str()?;
            Some((channel, SlotType::named(tag)))
        });
        ChannelMap(entries.collect())
    }

    pub fn to_property(&self) -> serde_json::Value {
        let object = self
            .0
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.as_str().to_string())))
            .collect();
        serde_json::Value::Object(object)
    }
}

impl fmt::Display for ChannelMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}: {v}")?;
        }
        write!(f, "}}")
    }
}

impl FromIterator<(u32, SlotType)> for ChannelMap {
    fn from_iter<I: IntoIterator<Item = (u32, SlotType)>>(iter: I) -> Self {
        ChannelMap(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// A locally input-connected data slot and its resolved type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalChannel {
    pub slot: usize,
    pub ty: SlotType,
}

/// Result of merging local channels onto an upstream map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub combined: ChannelMap,
    /// Channel each local slot ended up on.
    pub slot_channels: BTreeMap<usize, u32>,
}

impl MergeOutcome {
    /// Local slot carried on `channel`, if any.
    pub fn slot_for_channel(&self, channel: u32) -> Option<usize> {
        self.slot_channels
            .iter()
            .find(|(_, c)| **c == channel)
            .map(|(slot, _)| *slot)
    }
}

/// Merges `locals` (ascending slot order) onto `upstream`.
///
/// With `overwrite`, a concrete local type takes over the lowest unclaimed
/// upstream channel of the same type. Every other local channel is appended
/// after the highest upstream index.
pub fn merge_channels(upstream: &ChannelMap, locals: &[LocalChannel], overwrite: bool) -> MergeOutcome {
    let mut outcome = MergeOutcome {
        combined: upstream.clone(),
        slot_channels: BTreeMap::new(),
    };
    let mut claimed = BTreeSet::new();
    let mut next = upstream.next_index();

    for local in locals {
        if overwrite && local.ty.is_concrete() {
            if let Some(channel) = upstream.first_unclaimed_match(&local.ty, &claimed) {
                claimed.insert(channel);
                outcome.combined.insert(channel, local.ty.clone());
                outcome.slot_channels.insert(local.slot, channel);
                continue;
            }
        }
        outcome.combined.insert(next, local.ty.clone());
        outcome.slot_channels.insert(local.slot, next);
        next += 1;
    }
    outcome
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

/// `slot:type,slot:type`
pub fn encode_slot_types(entries: &[(usize, SlotType)]) -> String {
    entries
        .iter()
        .map(|(slot, ty)| format!("{slot}:{ty}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses `encode_slot_types` output, skipping malformed entries.
pub fn decode_slot_types(text: &str) -> Vec<(usize, SlotType)> {
    text.split(',')
        .filter_map(|entry| {
            let (slot, ty) = entry.trim().split_once(':')?;
            Some((slot.trim().parse().ok()?, SlotType::named(ty.trim())))
        })
        .collect()
}

/// Output-side expectation of a bus slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputHint {
    pub slot: usize,
    pub ty: SlotType,
    pub has_local_input: bool,
}

/// `slot:type:1,slot:type:0`
pub fn encode_output_hints(hints: &[OutputHint]) -> String {
    hints
        .iter()
        .map(|h| format!("{}:{}:{}", h.slot, h.ty, u8::from(h.has_local_input)))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn decode_output_hints(text: &str) -> Vec<OutputHint> {
    text.split(',')
        .filter_map(|entry| {
            let mut parts = entry.trim().splitn(3, ':');
            let slot = parts.next()?.trim().parse().ok()?;
            let ty = SlotType::named(parts.next()?.trim());
            let has_local_input = parts.next()?.trim() == "1";
            Some(OutputHint { slot, ty, has_local_input })
        })
        .collect()
}

pub fn encode_flag(flag: bool) -> &'static str {
    if flag {
        "1"
    } else {
        "0"
    }
}
