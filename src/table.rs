use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::BTreeSet;
use std::marker::PhantomData;
use thiserror::Error;

use crate::{
    error::ApiError,
    pagination::PageRequest,
    repository::{Document, IndexEntry, RepositoryState, StoreError},
    tuid::Tuid,
};

/// Name of the index holding tokenized search terms.
pub const SEARCH_INDEX: &str = "search";

/// Stamp
///
/// The identity and timestamps a `Table` writes onto an entity before persisting it.
#[derive(Debug, Clone)]
pub struct Stamp {
    pub id: String,
    pub version_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entity
///
/// Implemented by every versioned resource. The table stamps IDs and timestamps,
/// asks the entity to validate itself, and derives its secondary-index keys.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Table namespace in the repository, also used in messages ("user", "device").
    const TABLE: &'static str;

    fn id(&self) -> &str;
    fn version_id(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
    fn stamp(&mut self, stamp: Stamp);

    /// Canonicalizes set-like fields (roles, tags) before validation.
    fn normalize(&mut self) {}

    /// Every validation problem found; empty means valid.
    fn problems(&self) -> Vec<String> {
        Vec::new()
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        Vec::new()
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        None
    }
}

/// TableError
///
/// Failures of typed table operations. `From<TableError> for ApiError` decides
/// which of these are client errors and which are internal.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("{table} {id} not found")]
    NotFound { table: &'static str, id: String },

    #[error("{table} {id} version {version_id} not found")]
    VersionNotFound {
        table: &'static str,
        id: String,
        version_id: String,
    },

    #[error("{table} {id} version {version_id} is the current version")]
    CurrentVersion {
        table: &'static str,
        id: String,
        version_id: String,
    },

    #[error("invalid {table}: {}", .problems.join("; "))]
    Invalid {
        table: &'static str,
        problems: Vec<String>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{table} document codec error: {source}")]
    Codec {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl From<TableError> for ApiError {
    fn from(err: TableError) -> Self {
        match err {
            TableError::NotFound { .. } | TableError::VersionNotFound { .. } => {
                ApiError::NotFound(err.to_string())
            }
            TableError::CurrentVersion { .. } => ApiError::Conflict(err.to_string()),
            TableError::Invalid { problems, .. } => ApiError::Unprocessable(problems),
            TableError::Store(StoreError::NotFound { table, id }) => {
                ApiError::NotFound(format!("{table} {id} not found"))
            }
            TableError::Store(StoreError::AlreadyExists { table, id }) => {
                ApiError::Conflict(format!("{table} {id} already exists"))
            }
            TableError::Store(_) | TableError::Codec { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

/// Table
///
/// Typed façade over the shared `Repository`: the versioned-entity contract every
/// resource handler is written against. Cheap to clone.
pub struct Table<T> {
    repo: RepositoryState,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Table<T> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> Table<T> {
    pub fn new(repo: RepositoryState) -> Self {
        Self {
            repo,
            _entity: PhantomData,
        }
    }

    fn encode(entity: &T) -> Result<Document, TableError> {
        let body = serde_json::to_value(entity).map_err(|source| TableError::Codec {
            table: T::TABLE,
            source,
        })?;
        Ok(Document {
            id: entity.id().to_string(),
            version_id: entity.version_id().to_string(),
            body,
            index: entity.index_entries(),
            expires_at: entity.expires_at(),
        })
    }

    fn decode(doc: Document) -> Result<T, TableError> {
        serde_json::from_value(doc.body).map_err(|source| TableError::Codec {
            table: T::TABLE,
            source,
        })
    }

    fn not_found(id: &str) -> TableError {
        TableError::NotFound {
            table: T::TABLE,
            id: id.to_string(),
        }
    }

    fn validate(entity: &T) -> Result<(), TableError> {
        let problems = entity.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(TableError::Invalid {
                table: T::TABLE,
                problems,
            })
        }
    }

    /// create
    ///
    /// Assigns a fresh ID and version ID, validates, and writes the first version.
    pub async fn create(&self, mut entity: T) -> Result<T, TableError> {
        let now = Utc::now();
        let id = Tuid::new().to_string();
        let version_id = Tuid::new().to_string();
        entity.stamp(Stamp {
            id,
            version_id,
            created_at: now,
            updated_at: now,
        });
        entity.normalize();
        Self::validate(&entity)?;

        self.repo.create(T::TABLE, Self::encode(&entity)?).await?;
        tracing::debug!(table = T::TABLE, id = entity.id(), "created");
        Ok(entity)
    }

    /// update
    ///
    /// Whole-document replacement: writes `entity` as the new current version,
    /// keeping the original creation time.
    pub async fn update(&self, mut entity: T) -> Result<T, TableError> {
        let prior = self.read(entity.id()).await?;
        entity.stamp(Stamp {
            id: prior.id().to_string(),
            version_id: Tuid::new().to_string(),
            created_at: prior.created_at(),
            updated_at: Utc::now(),
        });
        entity.normalize();
        Self::validate(&entity)?;

        self.repo.update(T::TABLE, Self::encode(&entity)?).await?;
        tracing::debug!(
            table = T::TABLE,
            id = entity.id(),
            version_id = entity.version_id(),
            "updated"
        );
        Ok(entity)
    }

    pub async fn read(&self, id: &str) -> Result<T, TableError> {
        self.read_optional(id)
            .await?
            .ok_or_else(|| Self::not_found(id))
    }

    pub async fn read_optional(&self, id: &str) -> Result<Option<T>, TableError> {
        self.repo
            .read(T::TABLE, id)
            .await?
            .map(Self::decode)
            .transpose()
    }

    pub async fn exists(&self, id: &str) -> Result<bool, TableError> {
        Ok(self.repo.read(T::TABLE, id).await?.is_some())
    }

    pub async fn read_version(&self, id: &str, version_id: &str) -> Result<T, TableError> {
        let doc = self
            .repo
            .read_version(T::TABLE, id, version_id)
            .await?
            .ok_or_else(|| TableError::VersionNotFound {
                table: T::TABLE,
                id: id.to_string(),
                version_id: version_id.to_string(),
            })?;
        Self::decode(doc)
    }

    pub async fn read_version_ids(
        &self,
        id: &str,
        page: &PageRequest,
    ) -> Result<Vec<String>, TableError> {
        Ok(self.repo.read_version_ids(T::TABLE, id, page).await?)
    }

    /// read_latest
    ///
    /// The current entity, or its newest surviving version once it has been
    /// deleted or has expired. Access checks on history go through this, so
    /// they always follow the latest owner rather than whoever owned a page.
    pub async fn read_latest(&self, id: &str) -> Result<T, TableError> {
        if let Some(entity) = self.read_optional(id).await? {
            return Ok(entity);
        }
        let newest = self
            .read_version_ids(id, &PageRequest::new(true, 1, None))
            .await?;
        match newest.first() {
            Some(version_id) => self.read_version(id, version_id).await,
            None => Err(TableError::NotFound {
                table: T::TABLE,
                id: id.to_string(),
            }),
        }
    }

    /// read_versions
    ///
    /// Pages through an entity's history in version order, fetching the
    /// versions of the page concurrently.
    pub async fn read_versions(&self, id: &str, page: &PageRequest) -> Result<Vec<T>, TableError> {
        let version_ids = self.read_version_ids(id, page).await?;
        let reads = version_ids
            .iter()
            .map(|version_id| self.repo.read_version(T::TABLE, id, version_id));
        let docs = try_join_all(reads).await?;
        docs.into_iter().flatten().map(Self::decode).collect()
    }

    pub async fn read_ids(&self, page: &PageRequest) -> Result<Vec<String>, TableError> {
        Ok(self.repo.read_ids(T::TABLE, page).await?)
    }

    pub async fn read_all(&self, page: &PageRequest) -> Result<Vec<T>, TableError> {
        let ids = self.read_ids(page).await?;
        self.read_many(&ids).await
    }

    /// read_many
    ///
    /// Reads one entity per ID concurrently and returns them in the order of
    /// `ids`, whatever order the reads complete in. IDs that vanished between
    /// the scan and the read are skipped.
    pub async fn read_many(&self, ids: &[String]) -> Result<Vec<T>, TableError> {
        let reads = ids.iter().map(|id| self.read_optional(id));
        let entities = try_join_all(reads).await?;
        Ok(entities.into_iter().flatten().collect())
    }

    pub async fn delete(&self, id: &str) -> Result<T, TableError> {
        let doc = self
            .repo
            .delete(T::TABLE, id)
            .await?
            .ok_or_else(|| Self::not_found(id))?;
        tracing::debug!(table = T::TABLE, id, "deleted");
        Self::decode(doc)
    }

    /// delete_version
    ///
    /// Removes one historical version. The current version of a live entity
    /// cannot be deleted this way; delete the entity instead.
    pub async fn delete_version(&self, id: &str, version_id: &str) -> Result<T, TableError> {
        if let Some(current) = self.read_optional(id).await? {
            if current.version_id() == version_id {
                return Err(TableError::CurrentVersion {
                    table: T::TABLE,
                    id: id.to_string(),
                    version_id: version_id.to_string(),
                });
            }
        }

        let doc = self
            .repo
            .delete_version(T::TABLE, id, version_id)
            .await?
            .ok_or_else(|| TableError::VersionNotFound {
                table: T::TABLE,
                id: id.to_string(),
                version_id: version_id.to_string(),
            })?;
        Self::decode(doc)
    }

    pub async fn read_index_values(&self, index: &str) -> Result<Vec<String>, TableError> {
        Ok(self.repo.read_index_values(T::TABLE, index).await?)
    }

    pub async fn read_ids_by_index(
        &self,
        index: &str,
        value: &str,
        page: &PageRequest,
    ) -> Result<Vec<String>, TableError> {
        Ok(self.repo.read_index_ids(T::TABLE, index, value, page).await?)
    }

    pub async fn read_by_index(
        &self,
        index: &str,
        value: &str,
        page: &PageRequest,
    ) -> Result<Vec<T>, TableError> {
        let ids = self.read_ids_by_index(index, value, page).await?;
        self.read_many(&ids).await
    }

    /// First entity carrying `index = value`, if any. Used for unique lookups such as email.
    pub async fn find_by_index(&self, index: &str, value: &str) -> Result<Option<T>, TableError> {
        let page = PageRequest::new(false, 1, None);
        let found = self.read_by_index(index, value, &page).await?;
        Ok(found.into_iter().next())
    }

    /// search_ids
    ///
    /// Matches the tokenized `query` against the search index. With `any`, an ID
    /// matching at least one term qualifies; otherwise it must match every term.
    pub async fn search_ids(
        &self,
        query: &str,
        any: bool,
        page: &PageRequest,
    ) -> Result<Vec<String>, TableError> {
        let terms = search_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let everything = PageRequest::unbounded();
        let mut matched: Option<BTreeSet<String>> = None;
        for term in &terms {
            let ids: BTreeSet<String> = self
                .read_ids_by_index(SEARCH_INDEX, term, &everything)
                .await?
                .into_iter()
                .collect();
            matched = Some(match matched {
                None => ids,
                Some(acc) if any => acc.union(&ids).cloned().collect(),
                Some(acc) => acc.intersection(&ids).cloned().collect(),
            });
        }

        Ok(matched.map(|ids| page.select(&ids)).unwrap_or_default())
    }

    pub async fn search(
        &self,
        query: &str,
        any: bool,
        page: &PageRequest,
    ) -> Result<Vec<T>, TableError> {
        let ids = self.search_ids(query, any, page).await?;
        self.read_many(&ids).await
    }
}

/// search_terms
///
/// Lower-cases `text` and splits it on anything that is not alphanumeric.
pub fn search_terms(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Index entries for every search term found in `texts`.
pub fn search_entries<'a>(texts: impl IntoIterator<Item = &'a str>) -> Vec<IndexEntry> {
    let terms: BTreeSet<String> = texts.into_iter().flat_map(search_terms).collect();
    terms
        .into_iter()
        .map(|term| IndexEntry::new(SEARCH_INDEX, term))
        .collect()
}

/// The `date` index value (YYYY-MM-DD, UTC) for a timestamp.
pub fn date_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}
