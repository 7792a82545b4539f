//! Persistent store adapter and snapshot bundles.
//!
//! # Responsibility
//! - Keep the durable JSON layout behind typed save/load calls.
//! - Bundle all entities for export and install them on import.
//!
//! # Invariants
//! - Every entity lives under its own fixed key; keys are written
//!   independently, so cross-key consistency is not guaranteed.
//! - All calls are synchronous.

pub mod adapter;
pub mod snapshot;
