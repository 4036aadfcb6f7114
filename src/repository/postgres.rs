use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use super::{Document, Repository, StoreError};
use crate::pagination::PageRequest;

/// DocumentRow
///
/// Raw row shape shared by `entity_current` and `entity_versions`.
#[derive(Debug, FromRow)]
struct DocumentRow {
    id: String,
    version_id: String,
    body: serde_json::Value,
    expires_at: Option<DateTime<Utc>>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Document {
            id: row.id,
            version_id: row.version_id,
            body: row.body,
            index: Vec::new(),
            expires_at: row.expires_at,
        }
    }
}

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL. Documents are stored as
/// JSONB; `entity_current` holds the live version of each entity,
/// `entity_versions` the full history and `entity_index` the secondary keys.
/// Every multi-row write runs in a transaction.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// page_clause
///
/// Builds the cursor predicate plus ordering for a page. Only the comparison
/// operator and direction vary, and both come from fixed literals, so the SQL
/// text never contains caller input.
fn page_clause(column: &str, page: &PageRequest, first_param: usize) -> String {
    let (cmp, order) = if page.reverse { ("<", "DESC") } else { (">", "ASC") };
    format!(
        "{column} {cmp} ${first_param} ORDER BY {column} {order} LIMIT ${}",
        first_param + 1
    )
}

fn page_limit(page: &PageRequest) -> i64 {
    i64::try_from(page.limit).unwrap_or(i64::MAX)
}

async fn write_version(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    doc: &Document,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO entity_versions (table_name, id, version_id, body, expires_at) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(table)
    .bind(&doc.id)
    .bind(&doc.version_id)
    .bind(&doc.body)
    .bind(doc.expires_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn write_index(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    doc: &Document,
) -> Result<(), StoreError> {
    for entry in &doc.index {
        sqlx::query(
            "INSERT INTO entity_index (table_name, index_name, value, id) \
             VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING",
        )
        .bind(table)
        .bind(&entry.name)
        .bind(&entry.value)
        .bind(&doc.id)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn clear_index(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    id: &str,
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM entity_index WHERE table_name = $1 AND id = $2")
        .bind(table)
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn create(&self, table: &str, doc: Document) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Surviving history keeps a deleted ID taken, as it does in memory.
        let has_history = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM entity_versions WHERE table_name = $1 AND id = $2)",
        )
        .bind(table)
        .bind(&doc.id)
        .fetch_one(&mut *tx)
        .await?;
        if has_history {
            return Err(StoreError::AlreadyExists {
                table: table.to_string(),
                id: doc.id,
            });
        }

        let inserted = sqlx::query(
            "INSERT INTO entity_current (table_name, id, version_id, body, expires_at) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT DO NOTHING",
        )
        .bind(table)
        .bind(&doc.id)
        .bind(&doc.version_id)
        .bind(&doc.body)
        .bind(doc.expires_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            // Dropping the transaction rolls it back.
            return Err(StoreError::AlreadyExists {
                table: table.to_string(),
                id: doc.id,
            });
        }

        write_version(&mut tx, table, &doc).await?;
        write_index(&mut tx, table, &doc).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn read(&self, table: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, version_id, body, expires_at FROM entity_current \
             WHERE table_name = $1 AND id = $2 \
             AND (expires_at IS NULL OR expires_at > now())",
        )
        .bind(table)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Document::from))
    }

    async fn read_version(
        &self,
        table: &str,
        id: &str,
        version_id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, version_id, body, expires_at FROM entity_versions \
             WHERE table_name = $1 AND id = $2 AND version_id = $3",
        )
        .bind(table)
        .bind(id)
        .bind(version_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Document::from))
    }

    async fn read_version_ids(
        &self,
        table: &str,
        id: &str,
        page: &PageRequest,
    ) -> Result<Vec<String>, StoreError> {
        let sql = format!(
            "SELECT version_id FROM entity_versions WHERE table_name = $1 AND id = $2 AND {}",
            page_clause("version_id", page, 3)
        );
        let ids = sqlx::query_scalar::<_, String>(&sql)
            .bind(table)
            .bind(id)
            .bind(&page.offset)
            .bind(page_limit(page))
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn read_ids(&self, table: &str, page: &PageRequest) -> Result<Vec<String>, StoreError> {
        let sql = format!(
            "SELECT id FROM entity_current WHERE table_name = $1 \
             AND (expires_at IS NULL OR expires_at > now()) AND {}",
            page_clause("id", page, 2)
        );
        let ids = sqlx::query_scalar::<_, String>(&sql)
            .bind(table)
            .bind(&page.offset)
            .bind(page_limit(page))
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn update(&self, table: &str, doc: Document) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE entity_current SET version_id = $3, body = $4, expires_at = $5 \
             WHERE table_name = $1 AND id = $2 \
             AND (expires_at IS NULL OR expires_at > now())",
        )
        .bind(table)
        .bind(&doc.id)
        .bind(&doc.version_id)
        .bind(&doc.body)
        .bind(doc.expires_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                table: table.to_string(),
                id: doc.id,
            });
        }

        write_version(&mut tx, table, &doc).await?;
        clear_index(&mut tx, table, &doc.id).await?;
        write_index(&mut tx, table, &doc).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, DocumentRow>(
            "DELETE FROM entity_current WHERE table_name = $1 AND id = $2 \
             RETURNING id, version_id, body, expires_at",
        )
        .bind(table)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        clear_index(&mut tx, table, id).await?;
        tx.commit().await?;

        let now = Utc::now();
        Ok(row.map(Document::from).filter(|doc| !doc.is_expired(now)))
    }

    async fn delete_version(
        &self,
        table: &str,
        id: &str,
        version_id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "DELETE FROM entity_versions WHERE table_name = $1 AND id = $2 AND version_id = $3 \
             RETURNING id, version_id, body, expires_at",
        )
        .bind(table)
        .bind(id)
        .bind(version_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Document::from))
    }

    async fn read_index_values(&self, table: &str, index: &str) -> Result<Vec<String>, StoreError> {
        let values = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT value FROM entity_index \
             WHERE table_name = $1 AND index_name = $2 ORDER BY value",
        )
        .bind(table)
        .bind(index)
        .fetch_all(&self.pool)
        .await?;
        Ok(values)
    }

    async fn read_index_ids(
        &self,
        table: &str,
        index: &str,
        value: &str,
        page: &PageRequest,
    ) -> Result<Vec<String>, StoreError> {
        let sql = format!(
            "SELECT i.id FROM entity_index i \
             JOIN entity_current c ON c.table_name = i.table_name AND c.id = i.id \
             WHERE i.table_name = $1 AND i.index_name = $2 AND i.value = $3 \
             AND (c.expires_at IS NULL OR c.expires_at > now()) AND {}",
            page_clause("i.id", page, 4)
        );
        let ids = sqlx::query_scalar::<_, String>(&sql)
            .bind(table)
            .bind(index)
            .bind(value)
            .bind(&page.offset)
            .bind(page_limit(page))
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let purged = sqlx::query_scalar::<_, i64>(
            "WITH expired AS ( \
                 DELETE FROM entity_current \
                 WHERE expires_at IS NOT NULL AND expires_at <= now() \
                 RETURNING table_name, id \
             ), dropped_index AS ( \
                 DELETE FROM entity_index i USING expired e \
                 WHERE i.table_name = e.table_name AND i.id = e.id \
             ), dropped_versions AS ( \
                 DELETE FROM entity_versions v USING expired e \
                 WHERE v.table_name = e.table_name AND v.id = e.id \
             ) \
             SELECT count(*) FROM expired",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(u64::try_from(purged).unwrap_or_default())
    }
}
