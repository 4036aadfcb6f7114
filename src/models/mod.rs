use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::tuid;

mod device;
mod email;
mod event;
mod image;
mod metric;
mod organization;
mod token;
mod user;

pub use device::Device;
pub use email::{Email, EmailStatus};
pub use event::Event;
pub use image::Image;
pub use metric::Metric;
pub use organization::{Organization, OrganizationStatus};
pub use token::{CreateTokenRequest, Token};
pub use user::{ADMIN_ROLE, User, UserStatus};

/// Scrub
///
/// Redaction contract for entities shown to callers who may see an instance
/// without owning it (organization members, device readers).
///
/// - `scrub` clears the fields such callers must not see. It is idempotent.
/// - `restore_scrubbed` copies every protected field from `original` onto `self`.
///   It runs on update for non-admin callers, so a whole-document PUT can never
///   change a field the caller cannot see or is not allowed to set. Entities
///   only admins update (organizations) keep the default.
///
/// For users, devices and images, `x.scrub().restore_scrubbed(&x)` equals `x`
/// on every protected field.
pub trait Scrub: Sized {
    fn scrub(self) -> Self {
        self
    }

    fn restore_scrubbed(self, _original: &Self) -> Self {
        self
    }
}

/// PresignedUrl
///
/// A time-limited object storage URL handed to the client for a direct upload
/// or download, bypassing the API server.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PresignedUrl {
    pub url: String,
    /// Object key inside the bucket.
    pub resource_key: String,
    pub expires_in_secs: u64,
}

/// Sorts and de-duplicates a list of labels, dropping blanks.
pub(crate) fn normalize_labels(labels: &mut Vec<String>) {
    let set: BTreeSet<String> = labels
        .iter()
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty())
        .collect();
    *labels = set.into_iter().collect();
}

pub(crate) fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Appends a problem if `value` is set but is not a TUID.
pub(crate) fn check_reference(problems: &mut Vec<String>, field: &str, value: &str) {
    if !value.is_empty() && !tuid::is_valid(value) {
        problems.push(format!("{field} must be a valid ID"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_sorted_and_deduplicated() {
        let mut labels = vec![
            "b".to_string(),
            " a ".to_string(),
            "b".to_string(),
            "".to_string(),
        ];
        normalize_labels(&mut labels);
        assert_eq!(labels, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn email_shape() {
        assert!(looks_like_email("a@b.com"));
        assert!(!looks_like_email("a@b"));
        assert!(!looks_like_email("@b.com"));
        assert!(!looks_like_email("ab.com"));
    }
}
