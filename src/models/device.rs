use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use super::{Scrub, check_reference};
use crate::repository::IndexEntry;
use crate::table::{Entity, Stamp, date_key};

/// Device
///
/// A client installation. Devices expire after the configured TTL unless
/// refreshed by an update; an update on an expired device re-creates it.
/// Anyone may read a device, but only its user and admins see `clientIP`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct Device {
    pub id: String,
    #[serde(rename = "versionID")]
    pub version_id: String,
    #[serde(rename = "userID", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub user_agent: String,
    #[serde(rename = "clientIP")]
    pub client_ip: String,
    #[ts(type = "string")]
    pub expires_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Device {
    pub fn owned_by(&self, user_id: &str) -> bool {
        self.user_id.as_deref() == Some(user_id)
    }
}

impl Entity for Device {
    const TABLE: &'static str = "device";

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
        if self.user_id.as_deref().is_some_and(str::is_empty) {
            self.user_id = None;
        }
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if let Some(user_id) = &self.user_id {
            check_reference(&mut problems, "userID", user_id);
        }
        if self.expires_at <= self.updated_at {
            problems.push("expiresAt must be in the future".to_string());
        }
        problems
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        let mut entries = vec![IndexEntry::new("date", date_key(self.created_at))];
        if let Some(user_id) = &self.user_id {
            entries.push(IndexEntry::new("user", user_id.clone()));
        }
        entries
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        Some(self.expires_at)
    }
}

impl Scrub for Device {
    fn scrub(mut self) -> Self {
        self.client_ip.clear();
        self
    }

    fn restore_scrubbed(mut self, original: &Self) -> Self {
        self.client_ip = original.client_ip.clone();
        self.user_id = original.user_id.clone();
        self
    }
}
