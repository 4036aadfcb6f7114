use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use super::{Scrub, check_reference, normalize_labels};
use crate::repository::IndexEntry;
use crate::table::{Entity, Stamp, date_key, search_entries};

/// Image
///
/// Metadata for an image whose bytes live in object storage. The bytes are
/// transferred directly between the client and the bucket through presigned URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct Image {
    pub id: String,
    #[serde(rename = "versionID")]
    pub version_id: String,
    #[serde(rename = "ownerID")]
    pub owner_id: String,
    pub title: String,
    #[schema(example = "sunset.jpg")]
    pub file_name: String,
    #[schema(example = "image/jpeg")]
    pub content_type: String,
    pub file_size: u64,
    pub tags: Vec<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Image {
    /// Object key of the image bytes in the bucket.
    pub fn object_key(&self) -> String {
        format!("images/{}/{}", self.id, self.file_name)
    }
}

impl Entity for Image {
    const TABLE: &'static str = "image";

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
        self.tags.iter_mut().for_each(|tag| *tag = tag.to_lowercase());
        normalize_labels(&mut self.tags);
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.owner_id.is_empty() {
            problems.push("ownerID is required".to_string());
        }
        check_reference(&mut problems, "ownerID", &self.owner_id);
        if self.title.trim().is_empty() {
            problems.push("title is required".to_string());
        }
        if self.file_name.is_empty() {
            problems.push("fileName is required".to_string());
        } else if self.file_name.contains('/') || self.file_name.contains("..") {
            problems.push("fileName must not contain path separators".to_string());
        }
        if !self.content_type.starts_with("image/") {
            problems.push(format!("contentType {:?} is not an image type", self.content_type));
        }
        problems
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        let mut entries = vec![
            IndexEntry::new("user", self.owner_id.clone()),
            IndexEntry::new("date", date_key(self.created_at)),
        ];
        entries.extend(self.tags.iter().map(|tag| IndexEntry::new("tag", tag.clone())));
        entries.extend(search_entries([self.title.as_str(), self.file_name.as_str()]));
        entries
    }
}

impl Scrub for Image {
    /// Ownership is fixed at creation.
    fn restore_scrubbed(mut self, original: &Self) -> Self {
        self.owner_id = original.owner_id.clone();
        self
    }
}
