//! Quota manager: usage estimation, eviction and compression.
//!
//! # Responsibility
//! - Estimate how much of the durable medium is in use.
//! - Reclaim space by evicting stale sessions.
//! - Shrink serialized values as a last resort before a retried write.
//!
//! # Invariants
//! - Nothing here mutates the authoritative in-memory tree.

pub mod compress;
pub mod eviction;
pub mod usage;
