//! Durable medium abstractions and implementations.
//!
//! # Responsibility
//! - Define the key-value contract the store adapter writes through.
//! - Isolate SQLite details from store/service orchestration.
//!
//! # Invariants
//! - Backends report capacity exhaustion as a distinct error so the store
//!   can run its eviction-and-retry cycle.

pub mod kv_repo;
