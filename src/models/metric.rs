use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use super::{check_reference, normalize_labels};
use crate::repository::IndexEntry;
use crate::table::{Entity, Stamp, date_key};

/// Metric
///
/// A single client-reported measurement. Metrics are write-once: they can be
/// created by anyone and only read or deleted by admins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct Metric {
    pub id: String,
    #[serde(rename = "versionID")]
    pub version_id: String,
    pub name: String,
    pub value: f64,
    pub tags: Vec<String>,
    #[serde(rename = "userID", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(rename = "deviceID", skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Entity for Metric {
    const TABLE: &'static str = "metric";

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

    fn normalize(&mut self) {
        self.name = self.name.trim().to_lowercase();
        self.tags.iter_mut().for_each(|tag| *tag = tag.to_lowercase());
        normalize_labels(&mut self.tags);
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.name.is_empty() {
            problems.push("name is required".to_string());
        }
        if !self.value.is_finite() {
            problems.push("value must be a finite number".to_string());
        }
        if let Some(user_id) = &self.user_id {
            check_reference(&mut problems, "userID", user_id);
        }
        if let Some(device_id) = &self.device_id {
            check_reference(&mut problems, "deviceID", device_id);
        }
        problems
    }

    /// The metric name doubles as a tag, so `?tag=<name>` finds every sample of a metric.
    fn index_entries(&self) -> Vec<IndexEntry> {
        let mut entries = vec![
            IndexEntry::new("tag", self.name.clone()),
            IndexEntry::new("date", date_key(self.created_at)),
        ];
        entries.extend(
            self.tags
                .iter()
                .filter(|tag| **tag != self.name)
                .map(|tag| IndexEntry::new("tag", tag.clone())),
        );
        entries
    }
}
