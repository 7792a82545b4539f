//! Domain model for the knowledge tree and its sibling collections.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep the durable JSON layout in one place (serde attributes).
//!
//! # Invariants
//! - Every knowledge node is identified by an id unique within its tree.
//! - The tree top node is always `root`.
//! - Sessions and settings never reference tree nodes.

pub mod node;
pub mod session;
pub mod settings;
