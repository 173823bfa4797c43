pub mod slot_type;
pub mod slot;
pub mod id;
pub mod link;
pub mod node;
pub mod graph;
pub mod workflow;
pub mod error;

// Re-export commonly used types
pub use slot_type::SlotType;
pub use slot::{InputSlot, OutputSlot, SlotSide};
pub use id::{LinkId, NodeId};
pub use link::{Link, LinkRecord};
pub use node::Node;
pub use graph::{ConnectionChange, HostGraph};
pub use workflow::Workflow;
pub use error::CoreError;
