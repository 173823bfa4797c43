//! Input and output ports.
//!
//! An input holds at most one link id; an output holds an ordered list of
//! link ids. Ids may be stale: the host graph treats an id whose link record
//! is missing, or points elsewhere, as no connection.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use smallvec::SmallVec;

use crate::id::LinkId;
use crate::slot_type::SlotType;

/// Which port array of a node a slot lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotSide {
    Input,
    Output,
}

impl SlotSide {
    /// The other side of a port pair.
    pub fn opposite(self) -> SlotSide {
        match self {
            SlotSide::Input => SlotSide::Output,
            SlotSide::Output => SlotSide::Input,
        }
    }
}

impl fmt::Display for SlotSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotSide::Input => write!(f, "input"),
            SlotSide::Output => write!(f, "output"),
        }
    }
}

/// An input port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSlot {
    /// Stable machine identifier.
    pub name: String,
    /// Display string.
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub ty: SlotType,
    #[serde(default)]
    pub link: Option<LinkId>,
}

impl InputSlot {
    pub fn new(name: impl Into<String>, ty: SlotType) -> Self {
        let name = name.into();
        InputSlot {
            label: name.clone(),
            name,
            ty,
            link: None,
        }
    }

    /// Text shown for this slot: the label, or the name when unlabelled.
    pub fn display_text(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

/// An output port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSlot {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub ty: SlotType,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub links: SmallVec<[LinkId; 4]>,
}

impl OutputSlot {
    pub fn new(name: impl Into<String>, ty: SlotType) -> Self {
        let name = name.into();
        OutputSlot {
            label: name.clone(),
            name,
            ty,
            links: SmallVec::new(),
        }
    }

    pub fn display_text(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

/// Saved graphs write `"links": null` for outputs that never had a link.
fn null_as_empty<'de, D>(deserializer: D) -> Result<SmallVec<[LinkId; 4]>, D::Error>
where
    D: Deserializer<'de>,
{
    let links: Option<SmallVec<[LinkId; 4]>> = Option::deserialize(deserializer)?;
    Ok(links.unwrap_or_default())
}
