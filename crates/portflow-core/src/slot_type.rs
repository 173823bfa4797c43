//! Port data types.
//!
//! A slot type is either the wildcard [`SlotType::Any`] or a concrete type
//! tag such as `IMAGE` or `LATENT`. Tags are opaque strings owned by the host
//! application; the engine only compares them for equality and lowercases
//! them for labels.

use std::fmt;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// The data type carried by a port or cached on a link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SlotType {
    /// Wildcard: no concrete type is known.
    #[default]
    Any,
    /// A concrete type tag.
    Named(String),
}

impl SlotType {
    /// Serialized form of the wildcard.
    pub const ANY_TAG: &'static str = "*";

    /// Tag of the reserved bus port type.
    pub const BUS_TAG: &'static str = "BUS";

    /// Builds a slot type from a tag; `"*"` and the empty string map to `Any`.
    pub fn named(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if tag.is_empty() || tag == Self::ANY_TAG {
            SlotType::Any
        } else {
            SlotType::Named(tag)
        }
    }

    /// The reserved bus type.
    pub fn bus() -> Self {
        SlotType::Named(Self::BUS_TAG.to_string())
    }

    pub fn is_any(&self) -> bool {
        matches!(self, SlotType::Any)
    }

    pub fn is_concrete(&self) -> bool {
        !self.is_any()
    }

    pub fn is_bus(&self) -> bool {
        matches!(self, SlotType::Named(tag) if tag == Self::BUS_TAG)
    }

    /// The tag as written in a workflow file.
    pub fn as_str(&self) -> &str {
        match self {
            SlotType::Any => Self::ANY_TAG,
            SlotType::Named(tag) => tag,
        }
    }

    /// Returns `self` when concrete, otherwise `None`.
    pub fn concrete(&self) -> Option<&SlotType> {
        if self.is_concrete() {
            Some(self)
        } else {
            None
        }
    }

    /// Lowercased tag used as the base of a display label, `None` for `Any`.
    pub fn label_base(&self) -> Option<String> {
        match self {
            SlotType::Any => None,
            SlotType::Named(tag) => Some(tag.to_lowercase()),
        }
    }

    /// Returns `self` if concrete, otherwise `fallback`.
    pub fn or(self, fallback: SlotType) -> SlotType {
        if self.is_concrete() {
            self
        } else {
            fallback
        }
    }
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for SlotType {
    fn from(tag: &str) -> Self {
        SlotType::named(tag)
    }
}

impl Serialize for SlotType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Accepted on-disk shapes. Hosts write `-1` for event slots, which carry no
/// data type.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSlotType {
    Tag(String),
    Number(i64),
}

impl<'de> Deserialize<'de> for SlotType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawSlotType::deserialize(deserializer)? {
            RawSlotType::Tag(tag) => SlotType::named(tag),
            RawSlotType::Number(_) => SlotType::Any,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_spellings_map_to_any() {
        assert_eq!(SlotType::named("*"), SlotType::Any);
        assert_eq!(SlotType::named(""), SlotType::Any);
        assert_eq!(SlotType::from("IMAGE"), SlotType::Named("IMAGE".into()));
    }

    #[test]
    fn label_base_lowercases() {
        assert_eq!(SlotType::from("LATENT").label_base().as_deref(), Some("latent"));
        assert_eq!(SlotType::Any.label_base(), None);
    }

    #[test]
    fn or_prefers_concrete() {
        let image = SlotType::from("IMAGE");
        assert_eq!(SlotType::Any.or(image.clone()), image);
        assert_eq!(image.clone().or(SlotType::from("MASK")), image);
    }

    #[test]
    fn bus_tag_is_recognised() {
        assert!(SlotType::bus().is_bus());
        assert!(!SlotType::from("IMAGE").is_bus());
    }

    #[test]
    fn serializes_as_tag_string() {
        assert_eq!(serde_json::to_string(&SlotType::Any).unwrap(), "\"*\"");
        assert_eq!(serde_json::to_string(&SlotType::from("MASK")).unwrap(), "\"MASK\"");
    }

    #[test]
    fn deserializes_strings_and_event_numbers() {
        let t: SlotType = serde_json::from_str("\"IMAGE\"").unwrap();
        assert_eq!(t, SlotType::from("IMAGE"));
        let t: SlotType = serde_json::from_str("\"*\"").unwrap();
        assert!(t.is_any());
        let t: SlotType = serde_json::from_str("-1").unwrap();
        assert!(t.is_any());
    }
}
