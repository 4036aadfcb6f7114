use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;

use super::{Document, IndexEntry, Repository, StoreError};
use crate::pagination::PageRequest;

#[derive(Default)]
struct MemoryTable {
    current: BTreeMap<String, Document>,
    versions: BTreeMap<String, BTreeMap<String, Document>>,
    // index name -> value -> ids
    indexes: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

impl MemoryTable {
    fn live(&self, id: &str) -> Option<&Document> {
        let now = Utc::now();
        self.current.get(id).filter(|doc| !doc.is_expired(now))
    }

    fn add_index(&mut self, id: &str, entries: &[IndexEntry]) {
        for entry in entries {
            self.indexes
                .entry(entry.name.clone())
                .or_default()
                .entry(entry.value.clone())
                .or_default()
                .insert(id.to_string());
        }
    }

    fn remove_index(&mut self, id: &str, entries: &[IndexEntry]) {
        for entry in entries {
            if let Some(values) = self.indexes.get_mut(&entry.name) {
                if let Some(ids) = values.get_mut(&entry.value) {
                    ids.remove(id);
                    if ids.is_empty() {
                        values.remove(&entry.value);
                    }
                }
            }
        }
    }

    fn record_version(&mut self, doc: &Document) {
        let mut version = doc.clone();
        version.index.clear();
        self.versions
            .entry(doc.id.clone())
            .or_default()
            .insert(doc.version_id.clone(), version);
    }
}

/// MemoryRepository
///
/// In-process implementation of `Repository`. Used for local development when no
/// `DATABASE_URL` is configured, and as the backing store for the test suite.
/// Current documents keep their index entries so that updates and deletes can
/// remove stale keys.
#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<HashMap<String, MemoryTable>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn strip_index(doc: &Document) -> Document {
    Document {
        index: Vec::new(),
        ..doc.clone()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create(&self, table: &str, doc: Document) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let t = tables.entry(table.to_string()).or_default();

        if t.current.contains_key(&doc.id) || t.versions.contains_key(&doc.id) {
            // An expired document's ID is still taken; TUIDs are never reused.
            return Err(StoreError::AlreadyExists {
                table: table.to_string(),
                id: doc.id,
            });
        }

        t.add_index(&doc.id, &doc.index);
        t.record_version(&doc);
        t.current.insert(doc.id.clone(), doc);
        Ok(())
    }

    async fn read(&self, table: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .and_then(|t| t.live(id))
            .map(strip_index))
    }

    async fn read_version(
        &self,
        table: &str,
        id: &str,
        version_id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .and_then(|t| t.versions.get(id))
            .and_then(|versions| versions.get(version_id))
            .cloned())
    }

    async fn read_version_ids(
        &self,
        table: &str,
        id: &str,
        page: &PageRequest,
    ) -> Result<Vec<String>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .and_then(|t| t.versions.get(id))
            .map(|versions| page.select(versions.keys()))
            .unwrap_or_default())
    }

    async fn read_ids(&self, table: &str, page: &PageRequest) -> Result<Vec<String>, StoreError> {
        let tables = self.tables.read().await;
        let Some(t) = tables.get(table) else {
            return Ok(Vec::new());
        };
        let now = Utc::now();
        let live: Vec<&String> = t
            .current
            .iter()
            .filter(|(_, doc)| !doc.is_expired(now))
            .map(|(id, _)| id)
            .collect();
        Ok(page.select(live))
    }

    async fn update(&self, table: &str, doc: Document) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let not_found = || StoreError::NotFound {
            table: table.to_string(),
            id: doc.id.clone(),
        };
        let t = tables.get_mut(table).ok_or_else(not_found)?;
        if t.live(&doc.id).is_none() {
            return Err(not_found());
        }

        if let Some(previous) = t.current.remove(&doc.id) {
            t.remove_index(&doc.id, &previous.index);
        }
        t.add_index(&doc.id, &doc.index);
        t.record_version(&doc);
        t.current.insert(doc.id.clone(), doc);
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(t) = tables.get_mut(table) else {
            return Ok(None);
        };
        let Some(doc) = t.current.remove(id) else {
            return Ok(None);
        };
        t.remove_index(id, &doc.index);

        if doc.is_expired(Utc::now()) {
            return Ok(None);
        }
        Ok(Some(strip_index(&doc)))
    }

    async fn delete_version(
        &self,
        table: &str,
        id: &str,
        version_id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(t) = tables.get_mut(table) else {
            return Ok(None);
        };
        let Some(versions) = t.versions.get_mut(id) else {
            return Ok(None);
        };
        let removed = versions.remove(version_id);
        if versions.is_empty() {
            // No history left: the ID is only taken while a current document remains.
            t.versions.remove(id);
        }
        Ok(removed)
    }

    async fn read_index_values(&self, table: &str, index: &str) -> Result<Vec<String>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .and_then(|t| t.indexes.get(index))
            .map(|values| values.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn read_index_ids(
        &self,
        table: &str,
        index: &str,
        value: &str,
        page: &PageRequest,
    ) -> Result<Vec<String>, StoreError> {
        let tables = self.tables.read().await;
        let Some(t) = tables.get(table) else {
            return Ok(Vec::new());
        };
        let Some(ids) = t.indexes.get(index).and_then(|values| values.get(value)) else {
            return Ok(Vec::new());
        };
        let live: Vec<&String> = ids.iter().filter(|id| t.live(id).is_some()).collect();
        Ok(page.select(live))
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let mut purged = 0;
        for t in tables.values_mut() {
            let expired: Vec<String> = t
                .current
                .iter()
                .filter(|(_, doc)| doc.is_expired(now))
                .map(|(id, _)| id.clone())
                .collect();
            for id in expired {
                if let Some(doc) = t.current.remove(&id) {
                    t.remove_index(&id, &doc.index);
                }
                t.versions.remove(&id);
                purged += 1;
            }
        }
        Ok(purged)
    }
}
