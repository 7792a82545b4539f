//! Stale-session eviction.
//!
//! # Invariants
//! - Only the session collection is pruned; tree and settings are never
//!   touched by eviction.
//! - A session is kept only when its last activity is strictly newer than
//!   the cutoff. Records without a parseable time are treated as stale.
//! - A cutoff before the representable time range evicts nothing.

use crate::model::session::Sessions;
use chrono::{DateTime, Duration, Utc};

/// Returns the sessions still fresh at `now` and the number evicted.
pub fn evict_stale(
    sessions: &Sessions,
    cutoff_age: Duration,
    now: DateTime<Utc>,
) -> (Sessions, usize) {
    let Some(cutoff) = now.checked_sub_signed(cutoff_age) else {
        return (sessions.clone(), 0);
    };
    let mut evicted = 0;
    let pruned = sessions
        .iter()
        .filter(|(_, record)| {
            let fresh = record
                .last_activity()
                .is_some_and(|activity| activity > cutoff);
            if !fresh {
                evicted += 1;
            }
            fresh
        })
        .map(|(id, record)| (id.clone(), record.clone()))
        .collect::<Sessions>();
    (pruned, evicted)
}

#[cfg(test)]
mod tests {
    use super::evict_stale;
    use crate::model::session::{SessionRecord, Sessions};
    use chrono::{Duration, SecondsFormat, TimeZone, Utc};
    use serde_json::{json, Map, Value};

    fn record(updated_at: Value) -> SessionRecord {
        let mut attributes = Map::new();
        attributes.insert("updatedAt".to_string(), updated_at);
        SessionRecord::from_attributes(attributes)
    }

    #[test]
    fn evicts_sessions_older_than_cutoff() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let stamp = |age: Duration| {
            json!((now - age).to_rfc3339_opts(SecondsFormat::Millis, true))
        };

        let mut sessions = Sessions::new();
        sessions.insert("fresh".to_string(), record(stamp(Duration::days(2))));
        sessions.insert("stale".to_string(), record(stamp(Duration::days(45))));
        sessions.insert("edge".to_string(), record(stamp(Duration::days(30))));
        sessions.insert("garbled".to_string(), record(json!("not a date")));

        let (pruned, evicted) = evict_stale(&sessions, Duration::days(30), now);
        assert_eq!(evicted, 3);
        assert_eq!(pruned.keys().collect::<Vec<_>>(), ["fresh"]);
        assert_eq!(sessions.len(), 4);
    }

    #[test]
    fn unrepresentable_cutoff_keeps_everything() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let mut sessions = Sessions::new();
        sessions.insert("garbled".to_string(), record(json!("not a date")));
        sessions.insert("ancient".to_string(), record(json!("1970-01-01T00:00:00Z")));

        let (pruned, evicted) = evict_stale(&sessions, Duration::days(100_000_000), now);
        assert_eq!(evicted, 0);
        assert_eq!(pruned, sessions);
    }

    #[test]
    fn empty_collection_evicts_nothing() {
        let now = Utc::now();
        let (pruned, evicted) = evict_stale(&Sessions::new(), Duration::days(30), now);
        assert!(pruned.is_empty());
        assert_eq!(evicted, 0);
    }
}
