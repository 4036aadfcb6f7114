use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use super::check_reference;
use crate::repository::IndexEntry;
use crate::table::{Entity, Stamp};

/// Token
///
/// An opaque bearer credential. The token's own ID is the secret presented in
/// `Authorization: Bearer <id>`; it resolves to exactly one user until it
/// expires or is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct Token {
    pub id: String,
    #[serde(rename = "versionID")]
    pub version_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    #[ts(type = "string")]
    pub expires_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Entity for Token {
    const TABLE: &'static str = "token";

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
        if self.expires_at <= self.created_at {
            problems.push("expiresAt must be in the future".to_string());
        }
        problems
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        vec![IndexEntry::new("user", self.user_id.clone())]
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        Some(self.expires_at)
    }
}

/// CreateTokenRequest
///
/// Input payload for provisioning a bearer token (POST /v1/tokens).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct CreateTokenRequest {
    #[serde(rename = "userID")]
    pub user_id: String,
    /// Lifetime in seconds; the configured default applies when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
}
