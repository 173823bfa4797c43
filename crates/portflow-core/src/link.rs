//! Links between an output port and an input port.
//!
//! A [`Link`] is the in-memory record; [`LinkRecord`] is its compact
//! on-disk form, a six-element JSON array.

use serde::{Deserialize, Serialize};

use crate::id::{LinkId, NodeId};
use crate::slot::SlotSide;
use crate::slot_type::SlotType;

/// A directed connection from `origin`'s output `origin_slot` to `target`'s
/// input `target_slot`.
///
/// The cached `ty` starts as the wildcard and is overwritten by type
/// resolution. Slot indices are renumbered by the host when an earlier slot
/// is removed; the id never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub origin: NodeId,
    pub origin_slot: usize,
    pub target: NodeId,
    pub target_slot: usize,
    #[serde(rename = "type")]
    pub ty: SlotType,
}

impl Link {
    /// The node at the given end of the link, seen from that end's port kind.
    /// `SlotSide::Output` is the origin, `SlotSide::Input` the target.
    pub fn endpoint(&self, side: SlotSide) -> (NodeId, usize) {
        match side {
            SlotSide::Output => (self.origin, self.origin_slot),
            SlotSide::Input => (self.target, self.target_slot),
        }
    }
}

/// Serialized link: `[id, origin, origin_slot, target, target_slot, type]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord(
    pub LinkId,
    pub NodeId,
    pub usize,
    pub NodeId,
    pub usize,
    pub SlotType,
);

impl From<&Link> for LinkRecord {
    fn from(link: &Link) -> Self {
        LinkRecord(
            link.id,
            link.origin,
            link.origin_slot,
            link.target,
            link.target_slot,
            link.ty.clone(),
        )
    }
}

impl From<LinkRecord> for Link {
    fn from(record: LinkRecord) -> Self {
        let LinkRecord(id, origin, origin_slot, target, target_slot, ty) = record;
        Link {
            id,
            origin,
            origin_slot,
            target,
            target_slot,
            ty,
        }
    }
}
