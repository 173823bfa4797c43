//! Engine error types.
//!
//! Passes propagate these with `?`; the [`Editor`](crate::editor::Editor)
//! catches them at the deferred-pass boundary, logs them and carries on.

use portflow_core::{CoreError, NodeId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A host graph mutation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A pass was requested for a node that has no dynamic behavior.
    #[error("node {node} has no dynamic port behavior")]
    NotDynamic { node: NodeId },

    /// Settings could not be parsed or validated.
    #[error("invalid settings: {reason}")]
    Settings { reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
