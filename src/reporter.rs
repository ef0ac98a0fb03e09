//! Progress events emitted while a migration runs

use serde::Serialize;
use std::sync::Arc;

/// Callback receiving progress events
pub type Reporter = Arc<dyn Fn(&MigrationEvent) + Send + Sync>;

/// Staged work at the start of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PendingCounts {
    pub assets: usize,
    pub documents: usize,
}

/// Work done by the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigratedCounts {
    pub assets: usize,
    pub documents: usize,
}

/// Progress event
///
/// Serialized as `{"type": "<event name>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum MigrationEvent {
    #[serde(rename = "start")]
    Start { pending: PendingCounts },

    #[serde(rename = "assets:creating")]
    AssetsCreating {
        current: usize,
        remaining: usize,
        total: usize,
        asset_id: String,
    },

    #[serde(rename = "assets:created")]
    AssetsCreated { count: usize },

    #[serde(rename = "documents:masterLocale")]
    DocumentsMasterLocale { locale: String },

    #[serde(rename = "documents:creating")]
    DocumentsCreating {
        current: usize,
        remaining: usize,
        total: usize,
        title: String,
    },

    #[serde(rename = "documents:created")]
    DocumentsCreated { count: usize },

    #[serde(rename = "documents:updating")]
    DocumentsUpdating {
        current: usize,
        remaining: usize,
        total: usize,
        title: String,
    },

    #[serde(rename = "documents:updated")]
    DocumentsUpdated { count: usize },

    #[serde(rename = "end")]
    End { migrated: MigratedCounts },
}

impl MigrationEvent {
    /// Event name as serialized
    pub fn name(&self) -> &'static str {
        match self {
            MigrationEvent::Start { .. } => "start",
            MigrationEvent::AssetsCreating { .. } => "assets:creating",
            MigrationEvent::AssetsCreated { .. } => "assets:created",
            MigrationEvent::DocumentsMasterLocale { .. } => "documents:masterLocale",
            MigrationEvent::DocumentsCreating { .. } => "documents:creating",
            MigrationEvent::DocumentsCreated { .. } => "documents:created",
            MigrationEvent::DocumentsUpdating { .. } => "documents:updating",
            MigrationEvent::DocumentsUpdated { .. } => "documents:updated",
            MigrationEvent::End { .. } => "end",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_serialization() {
        let event = MigrationEvent::DocumentsMasterLocale {
            locale: "en-us".into(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "documents:masterLocale", "data": { "locale": "en-us" } })
        );
        assert_eq!(event.name(), "documents:masterLocale");
    }

    #[test]
    fn test_progress_event_fields() {
        let event = MigrationEvent::AssetsCreating {
            current: 1,
            remaining: 2,
            total: 3,
            asset_id: "a".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "assets:creating");
        assert_eq!(value["data"]["remaining"], 2);
    }
}
