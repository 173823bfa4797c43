//! Dynamic port and type propagation for node-graph editors.
//!
//! A handful of node kinds expose a variable number of ports whose types are
//! inferred from whatever is connected. This crate keeps their port lists in
//! shape, resolves and propagates types onto links, derives labels, and
//! aggregates typed channels across chains of bus nodes.
//!
//! # Modules
//!
//! - [`resolve`] -- most specific known type of a link or slot
//! - [`normalize`] -- slot-count normalization and gap compaction
//! - [`labels`] -- positional names and deduplicated labels
//! - [`bus`] -- channel maps, merging, and persisted summaries
//! - [`kinds`] -- per-kind behavior behind the [`SlotBehavior`] trait
//! - [`lifecycle`] -- node phases, load sessions, and the pass scheduler
//! - [`hooks`] -- structural event handlers keyed by class type
//! - [`engine`] -- per-node state and the synchronize pass
//! - [`editor`] -- host adapter that drives everything above
//! - [`settings`] -- layered engine settings

pub mod bus;
pub mod editor;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod kinds;
pub mod labels;
pub mod lifecycle;
pub mod normalize;
pub mod resolve;
pub mod settings;
pub mod topology;

// Re-export commonly used types
pub use bus::ChannelMap;
pub use editor::Editor;
pub use engine::{Engine, PassOutcome};
pub use error::EngineError;
pub use hooks::{DynamicHooks, HookCx, HookRegistry, NodeHooks};
pub use kinds::{DynamicKind, DynamicNode, NodeDef, PreviewItem, PreviewMessage, PreviewState, SlotBehavior};
pub use lifecycle::{HookContext, LoadSession, NodePhase, SyncReason};
pub use settings::EngineSettings;
