//! Tree mutation engine and traversal helpers.
//!
//! # Responsibility
//! - Turn edit intents into new `KnowledgeTree` values.
//! - Provide lookups used by services and tests.
//!
//! # Invariants
//! - All functions here are pure over their input snapshot.
//! - Each edit costs O(nodes on the rebuilt path plus their siblings).

pub mod mutate;
pub mod traverse;
