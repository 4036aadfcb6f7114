use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::pagination::PageRequest;

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// IndexEntry
///
/// One secondary-index key for a document, e.g. `("email", "a@b.com")`.
/// An entity can produce several entries under the same index name (one per role or tag).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexEntry {
    pub name: String,
    pub value: String,
}

impl IndexEntry {
    pub fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

/// Document
///
/// The untyped unit of storage: one version of one entity, serialized as JSON.
/// Index entries are only meaningful on writes; readers get them back empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub version_id: String,
    pub body: serde_json::Value,
    pub index: Vec<IndexEntry>,
    /// Documents past their expiry read as nonexistent.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// StoreError
///
/// Failures raised by a `Repository` backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{table} {id} already exists")]
    AlreadyExists { table: String, id: String },

    #[error("{table} {id} not found")]
    NotFound { table: String, id: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Repository Trait
///
/// The versioned document store contract. Every entity table is a namespace
/// (`table`) inside one repository. Each table keeps, per ID:
/// - a current document (absent once deleted or expired),
/// - an append-only history of every version written, keyed by version ID,
/// - secondary-index entries derived from the current document.
///
/// IDs and version IDs are TUIDs, so ascending string order is creation order,
/// and every listing method pages with the same cursor contract (`PageRequest`).
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across
/// Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Writes a new current document and its first version. Fails if the ID is
    /// taken: by a current document (expired or not) or by surviving history.
    async fn create(&self, table: &str, doc: Document) -> Result<(), StoreError>;

    /// Returns the current (unexpired) document.
    async fn read(&self, table: &str, id: &str) -> Result<Option<Document>, StoreError>;

    async fn read_version(
        &self,
        table: &str,
        id: &str,
        version_id: &str,
    ) -> Result<Option<Document>, StoreError>;

    /// Version IDs of one entity, including versions of a deleted entity.
    async fn read_version_ids(
        &self,
        table: &str,
        id: &str,
        page: &PageRequest,
    ) -> Result<Vec<String>, StoreError>;

    /// IDs of all current documents in the table.
    async fn read_ids(&self, table: &str, page: &PageRequest) -> Result<Vec<String>, StoreError>;

    /// Replaces the current document and appends a version. Fails if there is no current document.
    async fn update(&self, table: &str, doc: Document) -> Result<(), StoreError>;

    /// Removes the current document and its index entries; history is kept.
    async fn delete(&self, table: &str, id: &str) -> Result<Option<Document>, StoreError>;

    async fn delete_version(
        &self,
        table: &str,
        id: &str,
        version_id: &str,
    ) -> Result<Option<Document>, StoreError>;

    /// Distinct values present under an index, ascending.
    async fn read_index_values(&self, table: &str, index: &str) -> Result<Vec<String>, StoreError>;

    /// IDs of current documents carrying `index = value`.
    async fn read_index_ids(
        &self,
        table: &str,
        index: &str,
        value: &str,
        page: &PageRequest,
    ) -> Result<Vec<String>, StoreError>;

    /// Removes every document that has expired, with its index entries and its
    /// history, across all tables. Returns how many documents were purged.
    async fn purge_expired(&self) -> Result<u64, StoreError>;
}

/// spawn_expiry_sweep
///
/// Background task that purges expired documents (devices, tokens) every
/// `every`. Reads already hide them; the sweep reclaims the storage. A failed
/// pass is logged and retried on the next tick.
pub fn spawn_expiry_sweep(repo: RepositoryState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match repo.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "expired documents purged"),
                Err(e) => tracing::warn!(error = %e, "expiry sweep failed"),
            }
        }
    })
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
