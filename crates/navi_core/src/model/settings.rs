//! User settings persisted alongside the knowledge tree.
//!
//! # Invariants
//! - Missing keys take their documented default on load.
//! - Unknown keys survive a load/save cycle unchanged.

use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default age after which a session is evicted under quota pressure.
pub const DEFAULT_STALE_SESSION_DAYS: u32 = 30;
/// Largest accepted `staleSessionDays` (one hundred years).
pub const MAX_STALE_SESSION_DAYS: u32 = 36_500;
/// Default number of conversation turns kept per panel.
pub const DEFAULT_MAX_HISTORY_LENGTH: u32 = 50;

/// Flat mapping of named options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub theme: String,
    pub language: String,
    pub voice_enabled: bool,
    /// Persist tree and session edits immediately instead of on `flush`.
    pub auto_save: bool,
    pub api_key: String,
    pub max_history_length: u32,
    pub notifications: bool,
    /// Eviction cutoff for stale sessions, in days.
    pub stale_session_days: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: "dark".to_string(),
            language: "zh-CN".to_string(),
            voice_enabled: true,
            auto_save: true,
            api_key: String::new(),
            max_history_length: DEFAULT_MAX_HISTORY_LENGTH,
            notifications: true,
            stale_session_days: DEFAULT_STALE_SESSION_DAYS,
            extra: Map::new(),
        }
    }
}

impl Settings {
    /// Returns a copy with `patch` shallow-merged over the current values.
    ///
    /// Fails when a known key receives a value of the wrong shape, or when
    /// `staleSessionDays` exceeds [`MAX_STALE_SESSION_DAYS`].
    pub fn merged(&self, patch: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        let mut current = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (name, value) in patch {
            current.insert(name.clone(), value.clone());
        }
        let merged: Self = serde_json::from_value(Value::Object(current))?;
        if merged.stale_session_days > MAX_STALE_SESSION_DAYS {
            return Err(serde_json::Error::custom(format!(
                "staleSessionDays {} exceeds {MAX_STALE_SESSION_DAYS}",
                merged.stale_session_days
            )));
        }
        Ok(merged)
    }

    /// Session idle time past which eviction applies.
    ///
    /// Stored or imported values above the cap are clamped to it.
    pub fn stale_after(&self) -> chrono::Duration {
        let days = self.stale_session_days.min(MAX_STALE_SESSION_DAYS);
        chrono::Duration::days(i64::from(days))
    }
}

#[cfg(test)]
mod tests {
    use super::{Settings, MAX_STALE_SESSION_DAYS};
    use serde_json::json;

    #[test]
    fn partial_json_is_merged_over_defaults() {
        let settings: Settings =
            serde_json::from_value(json!({"theme": "light", "fontSize": 14})).unwrap();
        assert_eq!(settings.theme, "light");
        assert_eq!(settings.language, "zh-CN");
        assert!(settings.auto_save);
        assert_eq!(settings.extra.get("fontSize"), Some(&json!(14)));

        let encoded = serde_json::to_value(&settings).unwrap();
        assert_eq!(encoded["fontSize"], 14);
        assert_eq!(encoded["voiceEnabled"], true);
        assert_eq!(encoded["staleSessionDays"], 30);
    }

    #[test]
    fn merged_rejects_wrongly_typed_known_key() {
        let patch = json!({"autoSave": "yes"});
        let result = Settings::default().merged(patch.as_object().unwrap());
        assert!(result.is_err());
    }

    #[test]
    fn merged_overrides_known_keys() {
        let patch = json!({"autoSave": false, "staleSessionDays": 7});
        let merged = Settings::default()
            .merged(patch.as_object().unwrap())
            .unwrap();
        assert!(!merged.auto_save);
        assert_eq!(merged.stale_after(), chrono::Duration::days(7));
    }

    #[test]
    fn oversized_stale_days_are_rejected_on_merge_and_clamped_on_load() {
        let patch = json!({"staleSessionDays": 100_000_000});
        assert!(Settings::default()
            .merged(patch.as_object().unwrap())
            .is_err());

        let loaded: Settings =
            serde_json::from_value(json!({"staleSessionDays": 100_000_000})).unwrap();
        assert_eq!(
            loaded.stale_after(),
            chrono::Duration::days(i64::from(MAX_STALE_SESSION_DAYS))
        );
    }
}
