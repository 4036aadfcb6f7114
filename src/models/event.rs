use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::error::LogLevel;
use crate::repository::IndexEntry;
use crate::table::{Entity, Stamp, date_key};

/// Event
///
/// An audit record. Written for every internal error (ERROR), for best-effort
/// cascade failures (WARN) and for every successful mutation (INFO).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct Event {
    pub id: String,
    #[serde(rename = "versionID")]
    pub version_id: String,
    pub log_level: LogLevel,
    pub code: u16,
    pub message: String,
    pub uri: String,
    pub method: String,
    /// The authenticated caller, when there was one.
    #[serde(rename = "userID", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Entity for Event {
    const TABLE: &'static str = "event";

    fn id(&self) -> &str {
        &self.id
    }

    fn version_id(&self) -> &str {
        &self.version_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn stamp(&mut self, stamp: Stamp) {
        self.id = stamp.id;
        self.version_id = stamp.version_id;
        self.created_at = stamp.created_at;
        self.updated_at = stamp.updated_at;
    }

    fn problems(&self) -> Vec<String> {
        if self.message.is_empty() {
            vec!["message is required".to_string()]
        } else {
            Vec::new()
        }
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        vec![
            IndexEntry::new("level", self.log_level.as_str()),
            IndexEntry::new("date", date_key(self.created_at)),
        ]
    }
}
