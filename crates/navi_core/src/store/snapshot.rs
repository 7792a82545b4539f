//! Export/import bundles of every durable entity.
//!
//! # Invariants
//! - An export always carries all three entities plus time and version.
//! - An import may carry any subset; absent (or `null`) fields mean
//!   "leave the stored value alone".

use crate::model::node::KnowledgeTree;
use crate::model::session::Sessions;
use crate::model::settings::Settings;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Schema version stamped on every export.
pub const SNAPSHOT_VERSION: &str = "1.0.0";

/// Complete point-in-time bundle of tree, sessions and settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    pub sessions: Sessions,
    pub knowledge_graph: KnowledgeTree,
    pub settings: Settings,
    /// RFC 3339 time the bundle was taken.
    pub export_time: String,
    pub version: String,
}

impl ExportSnapshot {
    /// Bundles the given values, stamped with the current time.
    pub fn new(sessions: Sessions, knowledge_graph: KnowledgeTree, settings: Settings) -> Self {
        Self {
            sessions,
            knowledge_graph,
            settings,
            export_time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            version: SNAPSHOT_VERSION.to_string(),
        }
    }
}

/// Partial bundle accepted by import.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportSnapshot {
    pub sessions: Option<Sessions>,
    pub knowledge_graph: Option<KnowledgeTree>,
    pub settings: Option<Settings>,
    pub export_time: Option<String>,
    pub version: Option<String>,
}

impl ImportSnapshot {
    pub fn is_empty(&self) -> bool {
        self.sessions.is_none() && self.knowledge_graph.is_none() && self.settings.is_none()
    }
}

impl From<ExportSnapshot> for ImportSnapshot {
    fn from(value: ExportSnapshot) -> Self {
        Self {
            sessions: Some(value.sessions),
            knowledge_graph: Some(value.knowledge_graph),
            settings: Some(value.settings),
            export_time: Some(value.export_time),
            version: Some(value.version),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ExportSnapshot, ImportSnapshot, SNAPSHOT_VERSION};
    use crate::model::node::KnowledgeTree;
    use crate::model::session::Sessions;
    use crate::model::settings::Settings;
    use serde_json::json;

    #[test]
    fn export_uses_expected_wire_fields() {
        let snapshot =
            ExportSnapshot::new(Sessions::new(), KnowledgeTree::default(), Settings::default());
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["version"], SNAPSHOT_VERSION);
        assert_eq!(json["knowledgeGraph"]["id"], "root");
        assert_eq!(json["sessions"], json!({}));
        assert_eq!(json["settings"]["theme"], "dark");
        assert!(json["exportTime"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn import_accepts_subsets_and_nulls() {
        let snapshot: ImportSnapshot =
            serde_json::from_value(json!({"settings": {"theme": "light"}, "sessions": null}))
                .unwrap();
        assert!(snapshot.sessions.is_none());
        assert!(snapshot.knowledge_graph.is_none());
        assert_eq!(snapshot.settings.unwrap().theme, "light");

        let empty: ImportSnapshot = serde_json::from_value(json!({})).unwrap();
        assert!(empty.is_empty());
    }
}
