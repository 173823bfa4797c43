//! Core error types for portflow-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of the host graph model. Lookups never error; they return
//! `Option`. Only mutators and (de)serialization produce a `CoreError`.

use thiserror::Error;

use crate::id::{LinkId, NodeId};
use crate::slot::SlotSide;

/// Core errors produced by the portflow-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A node id was not found in the graph.
    #[error("node not found: NodeId({id})", id = id.0)]
    NodeNotFound { id: NodeId },

    /// A slot index is past the end of the node's port array.
    #[error("{side} slot {slot} out of range on NodeId({node})", node = node.0)]
    SlotOutOfRange {
        node: NodeId,
        side: SlotSide,
        slot: usize,
    },

    /// A node with this id already exists.
    #[error("duplicate node: NodeId({id})", id = id.0)]
    DuplicateNode { id: NodeId },

    /// A link with this id already exists.
    #[error("duplicate link: LinkId({id})", id = id.0)]
    DuplicateLink { id: LinkId },

    /// A workflow document could not be read or written.
    #[error("workflow serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
