use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use super::{check_reference, looks_like_email};
use crate::repository::IndexEntry;
use crate::table::{Entity, Stamp, date_key};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum EmailStatus {
    #[default]
    Pending,
    Sent,
    Failed,
}

impl EmailStatus {
    pub const ALL: [EmailStatus; 3] = [
        EmailStatus::Pending,
        EmailStatus::Sent,
        EmailStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Pending => "PENDING",
            EmailStatus::Sent => "SENT",
            EmailStatus::Failed => "FAILED",
        }
    }
}

/// Email
///
/// An outbound message record addressed on behalf of a user. Delivery is
/// handled elsewhere; this service only tracks the message and its status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct Email {
    pub id: String,
    #[serde(rename = "versionID")]
    pub version_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub status: EmailStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Entity for Email {
    const TABLE: &'static str = "email";

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
        let mut problems = Vec::new();
        if self.user_id.is_empty() {
            problems.push("userID is required".to_string());
        }
        check_reference(&mut problems, "userID", &self.user_id);
        if !looks_like_email(&self.recipient) {
            problems.push(format!("recipient {:?} is not a valid address", self.recipient));
        }
        if self.subject.trim().is_empty() {
            problems.push("subject is required".to_string());
        }
        problems
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        vec![
            IndexEntry::new("user", self.user_id.clone()),
            IndexEntry::new("status", self.status.as_str()),
            IndexEntry::new("date", date_key(self.created_at)),
        ]
    }
}
