//! Document store handle.
//!
//! Wraps the SQLite pool behind an explicitly constructed [`DocumentStore`]
//! that is opened once at process start and passed into each component.
//! The store enforces URL uniqueness on documents; a duplicate insert is a
//! normal outcome surfaced as [`UpsertOutcome::AlreadyExists`], never an
//! error and never a silent overwrite.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

use crate::config::Config;
use crate::embedding::blob_to_vec;
use crate::models::{Chunk, DocumentMetadata, DocumentRecord, IndexEntry};

/// Result of an insert keyed by URL.
#[derive(Debug)]
pub enum UpsertOutcome {
    /// First insert for this URL; the record carries its new identity.
    Inserted(DocumentRecord),
    /// The uniqueness constraint on `url` rejected the insert.
    AlreadyExists { url: String },
}

#[derive(Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
}

impl DocumentStore {
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::open(&config.db.path).await
    }

    pub async fn open(db_path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Insert a document keyed by its URL.
    ///
    /// The store's unique index on `url` arbitrates concurrent inserts of the
    /// same filing; the loser observes `AlreadyExists`. Every other database
    /// failure propagates unmodified.
    pub async fn insert_document(
        &self,
        url: &str,
        metadata: &DocumentMetadata,
    ) -> Result<UpsertOutcome> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();
        let metadata_json = serde_json::to_string(metadata)?;

        let result = sqlx::query(
            r#"
            INSERT INTO documents (id, url, metadata_json, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(url)
        .bind(&metadata_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(UpsertOutcome::Inserted(DocumentRecord {
                id,
                url: url.to_string(),
                metadata: metadata.clone(),
                created_at: now,
                updated_at: now,
            })),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Ok(UpsertOutcome::AlreadyExists {
                    url: url.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query(
            "SELECT id, url, metadata_json, created_at, updated_at FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(document_from_row))
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let rows = sqlx::query(
            "SELECT id, url, metadata_json, created_at, updated_at FROM documents ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(document_from_row).collect())
    }

    pub async fn count_documents(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Look up index-registry entries for the full id set.
    ///
    /// Returns `None` when any requested id is unknown to the registry — the
    /// expected path for genuinely new documents, which the orchestrator
    /// answers by building.
    pub async fn find_index_entries(
        &self,
        ids: &[String],
    ) -> Result<Option<HashMap<String, IndexEntry>>> {
        let mut entries = HashMap::with_capacity(ids.len());
        for id in ids {
            match self.find_index_entry(id).await? {
                Some(entry) => {
                    entries.insert(id.clone(), entry);
                }
                None => return Ok(None),
            }
        }
        Ok(Some(entries))
    }

    pub async fn find_index_entry(&self, document_id: &str) -> Result<Option<IndexEntry>> {
        let row = sqlx::query(
            "SELECT document_id, model, dims, chunk_count, created_at FROM index_entries WHERE document_id = ?",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| IndexEntry {
            document_id: row.get("document_id"),
            model: row.get("model"),
            dims: row.get("dims"),
            chunk_count: row.get("chunk_count"),
            created_at: row.get("created_at"),
        }))
    }

    /// Record that an index exists for a document. Keyed by document id, so
    /// at most one entry survives per document.
    pub async fn register_index_entry(&self, entry: &IndexEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO index_entries (document_id, model, dims, chunk_count, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(document_id) DO UPDATE SET
                model = excluded.model,
                dims = excluded.dims,
                chunk_count = excluded.chunk_count,
                created_at = excluded.created_at
            "#,
        )
        .bind(&entry.document_id)
        .bind(&entry.model)
        .bind(entry.dims)
        .bind(entry.chunk_count)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Replace a document's chunks (and any vectors hanging off them) in one
    /// transaction.
    pub async fn replace_chunks(&self, document_id: &str, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunk_vectors WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO chunks (id, document_id, chunk_index, page, text, hash) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(chunk.chunk_index)
            .bind(chunk.page)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn upsert_vector(
        &self,
        chunk_id: &str,
        document_id: &str,
        embedding: &[u8],
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chunk_vectors (chunk_id, document_id, embedding)
            VALUES (?, ?, ?)
            ON CONFLICT(chunk_id) DO UPDATE SET
                document_id = excluded.document_id,
                embedding = excluded.embedding
            "#,
        )
        .bind(chunk_id)
        .bind(document_id)
        .bind(embedding)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn load_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT id, document_id, chunk_index, page, text, hash FROM chunks WHERE document_id = ? ORDER BY chunk_index ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Chunk {
                id: row.get("id"),
                document_id: row.get("document_id"),
                chunk_index: row.get("chunk_index"),
                page: row.get("page"),
                text: row.get("text"),
                hash: row.get("hash"),
            })
            .collect())
    }

    pub async fn load_vectors(&self, document_id: &str) -> Result<HashMap<String, Vec<f32>>> {
        let rows = sqlx::query(
            "SELECT chunk_id, embedding FROM chunk_vectors WHERE document_id = ?",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                (row.get("chunk_id"), blob_to_vec(&blob))
            })
            .collect())
    }
}

fn document_from_row(row: sqlx::sqlite::SqliteRow) -> DocumentRecord {
    let metadata_json: String = row.get("metadata_json");
    DocumentRecord {
        id: row.get("id"),
        url: row.get("url"),
        metadata: parse_metadata(&metadata_json),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Stored payloads written by a newer build land in the `Other` bucket
/// instead of failing the read.
fn parse_metadata(json: &str) -> DocumentMetadata {
    serde_json::from_str(json).unwrap_or_else(|_| {
        DocumentMetadata::Other(serde_json::from_str(json).unwrap_or(serde_json::Value::Null))
    })
}
