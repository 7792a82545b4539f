//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate tree edits and store calls into use-case level APIs.
//! - Keep UI/chat callers decoupled from storage details.

pub mod conversation;
pub mod knowledge_service;
