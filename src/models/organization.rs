use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use super::Scrub;
use crate::repository::IndexEntry;
use crate::table::{Entity, Stamp, date_key, search_entries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum OrganizationStatus {
    #[default]
    Pending,
    Enabled,
    Disabled,
}

impl OrganizationStatus {
    pub const ALL: [OrganizationStatus; 3] = [
        OrganizationStatus::Pending,
        OrganizationStatus::Enabled,
        OrganizationStatus::Disabled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizationStatus::Pending => "PENDING",
            OrganizationStatus::Enabled => "ENABLED",
            OrganizationStatus::Disabled => "DISABLED",
        }
    }
}

/// Organization
///
/// A group of users. Members may read their own organization, scrubbed of `notes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct Organization {
    pub id: String,
    #[serde(rename = "versionID")]
    pub version_id: String,
    pub name: String,
    pub status: OrganizationStatus,
    pub notes: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Entity for Organization {
    const TABLE: &'static str = "organization";

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
        self.name = self.name.trim().to_string();
    }

    fn problems(&self) -> Vec<String> {
        if self.name.is_empty() {
            vec!["name is required".to_string()]
        } else {
            Vec::new()
        }
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        let mut entries = vec![
            IndexEntry::new("status", self.status.as_str()),
            IndexEntry::new("date", date_key(self.created_at)),
        ];
        entries.extend(search_entries([self.name.as_str()]));
        entries
    }
}

impl Scrub for Organization {
    fn scrub(mut self) -> Self {
        self.notes.clear();
        self
    }
}
