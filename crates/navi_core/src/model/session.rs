//! Conversation session records.
//!
//! # Responsibility
//! - Hold the free-form attribute bag stored per session id.
//! - Expose the activity timestamp used by stale-session eviction.
//!
//! # Invariants
//! - Sessions are keyed by opaque id; the collection is unordered by meaning
//!   (stored in a `BTreeMap` only for deterministic serialization).
//! - Updates merge attributes shallowly and refresh `updatedAt`.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Attribute carrying the last update time (RFC 3339).
pub const SESSION_UPDATED_AT: &str = "updatedAt";
/// Attribute carrying the creation time (RFC 3339).
pub const SESSION_CREATED_AT: &str = "createdAt";

/// All stored sessions keyed by session id.
pub type Sessions = BTreeMap<String, SessionRecord>;

/// One session's attribute bag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionRecord(Map<String, Value>);

impl SessionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_attributes(attributes: Map<String, Value>) -> Self {
        Self(attributes)
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Shallow-merges `attributes` and stamps `updatedAt` with `now`.
    ///
    /// `createdAt` is set once, on the first touch of a record that lacks it.
    pub fn merge(&mut self, attributes: Map<String, Value>, now: DateTime<Utc>) {
        for (name, value) in attributes {
            self.0.insert(name, value);
        }
        let stamp = Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true));
        if !self.0.contains_key(SESSION_CREATED_AT) {
            self.0.insert(SESSION_CREATED_AT.to_string(), stamp.clone());
        }
        self.0.insert(SESSION_UPDATED_AT.to_string(), stamp);
    }

    /// Last activity time: `updatedAt`, falling back to `createdAt`.
    ///
    /// Returns `None` when neither attribute holds a parseable time.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.0
            .get(SESSION_UPDATED_AT)
            .and_then(parse_timestamp)
            .or_else(|| self.0.get(SESSION_CREATED_AT).and_then(parse_timestamp))
    }
}

/// Accepts RFC 3339 strings or epoch-millisecond numbers.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc)),
        Value::Number(number) => number
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}
