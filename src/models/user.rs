use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use super::{Scrub, check_reference, looks_like_email, normalize_labels};
use crate::repository::IndexEntry;
use crate::table::{Entity, Stamp, date_key};

/// The role that satisfies every role check.
pub const ADMIN_ROLE: &str = "admin";

/// UserStatus
///
/// Lifecycle state of a user account. Only `ENABLED` users can authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum UserStatus {
    #[default]
    Pending,
    Enabled,
    Disabled,
}

impl UserStatus {
    pub const ALL: [UserStatus; 3] = [
        UserStatus::Pending,
        UserStatus::Enabled,
        UserStatus::Disabled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Pending => "PENDING",
            UserStatus::Enabled => "ENABLED",
            UserStatus::Disabled => "DISABLED",
        }
    }
}

/// User
///
/// An account. `roles` is kept as a sorted set; `admin` grants every role.
/// `notes` are operator notes, hidden from other members of the organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct User {
    pub id: String,
    #[serde(rename = "versionID")]
    pub version_id: String,
    pub email: String,
    pub display_name: String,
    #[serde(rename = "orgID")]
    pub org_id: String,
    pub roles: Vec<String>,
    pub status: UserStatus,
    pub notes: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_enabled(&self) -> bool {
        self.status == UserStatus::Enabled
    }
}

impl Entity for User {
    const TABLE: &'static str = "user";

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
        self.email = self.email.trim().to_lowercase();
        normalize_labels(&mut self.roles);
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.email.is_empty() {
            problems.push("email is required".to_string());
        } else if !looks_like_email(&self.email) {
            problems.push(format!("email {:?} is not a valid address", self.email));
        }
        check_reference(&mut problems, "orgID", &self.org_id);
        for role in &self.roles {
            if !role.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
                problems.push(format!(
                    "role {role:?} may only contain letters, digits, '-' and '_'"
                ));
            }
        }
        problems
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        let mut entries = vec![
            IndexEntry::new("email", self.email.clone()),
            IndexEntry::new("status", self.status.as_str()),
            IndexEntry::new("date", date_key(self.created_at)),
        ];
        if !self.org_id.is_empty() {
            entries.push(IndexEntry::new("org", self.org_id.clone()));
        }
        entries.extend(self.roles.iter().map(|role| IndexEntry::new("role", role.clone())));
        entries
    }
}

impl Scrub for User {
    fn scrub(mut self) -> Self {
        self.notes.clear();
        self
    }

    /// Non-admins cannot change their own roles, status or organization.
    fn restore_scrubbed(mut self, original: &Self) -> Self {
        self.roles = original.roles.clone();
        self.status = original.status;
        self.org_id = original.org_id.clone();
        self.notes = original.notes.clone();
        self
    }
}
