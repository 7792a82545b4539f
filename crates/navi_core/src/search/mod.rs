//! Search entry points over the in-memory knowledge tree.
//!
//! # Responsibility
//! - Expose flat search and the filtered display view.
//! - Keep match semantics (trim, case folding) inside core.

pub mod filter;
