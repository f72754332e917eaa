//! libSQL storage layer for WikiSync.
//!
//! The [`Storage`] struct wraps a local libSQL database holding everything a
//! sync leaves behind: the persisted cursor, the emitted documents, stored
//! image attachments, and sync run history. The sync engine is the sole
//! writer; nothing here is shared across processes.

mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use wikisync_shared::{ImageRef, OutputDocument, Result, SyncCursor, WikiSyncError};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

/// Summary row from the sync run history.
#[derive(Debug, Clone)]
pub struct SyncRunSummary {
    pub id: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub stats_json: Option<String>,
}

impl Storage {
    /// Open or create a database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WikiSyncError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| WikiSyncError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| WikiSyncError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    WikiSyncError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // ------------------------------------------------------------------
    // Cursor persistence
    // ------------------------------------------------------------------

    /// Load the persisted cursor for a connector instance, if one exists.
    pub async fn load_cursor(&self, connector: &str) -> Result<Option<SyncCursor>> {
        let mut rows = self
            .conn
            .query(
                "SELECT cursor_json FROM sync_state WHERE connector = ?1",
                params![connector],
            )
            .await
            .map_err(|e| WikiSyncError::Storage(e.to_string()))?;

        let row = rows
            .next()
            .await
            .map_err(|e| WikiSyncError::Storage(e.to_string()))?;

        match row {
            Some(row) => {
                let json: String = row
                    .get(0)
                    .map_err(|e| WikiSyncError::Storage(e.to_string()))?;
                let cursor: SyncCursor = serde_json::from_str(&json).map_err(|e| {
                    WikiSyncError::Storage(format!("corrupt cursor for {connector}: {e}"))
                })?;
                Ok(Some(cursor))
            }
            None => Ok(None),
        }
    }

    /// Persist the cursor for a connector instance.
    pub async fn save_cursor(&self, connector: &str, cursor: &SyncCursor) -> Result<()> {
        let json = serde_json::to_string(cursor)
            .map_err(|e| WikiSyncError::Storage(format!("cursor serialization: {e}")))?;

        self.conn
            .execute(
                "INSERT INTO sync_state (connector, cursor_json, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(connector) DO UPDATE SET
                     cursor_json = excluded.cursor_json,
                     updated_at = excluded.updated_at",
                params![connector, json, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| WikiSyncError::Storage(e.to_string()))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Insert or replace an emitted document.
    pub async fn upsert_document(&self, doc: &OutputDocument) -> Result<()> {
        let sections_json = serde_json::to_string(&doc.sections)
            .map_err(|e| WikiSyncError::Storage(format!("section serialization: {e}")))?;
        let metadata_json = serde_json::to_string(&doc.metadata)
            .map_err(|e| WikiSyncError::Storage(format!("metadata serialization: {e}")))?;
        let content_hash = compute_hash(&sections_json);

        self.conn
            .execute(
                "INSERT INTO documents
                     (id, title, semantic_identifier, sections_json, metadata_json,
                      content_hash, updated_at, synced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                     title = excluded.title,
                     semantic_identifier = excluded.semantic_identifier,
                     sections_json = excluded.sections_json,
                     metadata_json = excluded.metadata_json,
                     content_hash = excluded.content_hash,
                     updated_at = excluded.updated_at,
                     synced_at = excluded.synced_at",
                params![
                    doc.id.as_str(),
                    doc.title.as_str(),
                    doc.semantic_identifier.as_str(),
                    sections_json,
                    metadata_json,
                    content_hash,
                    doc.updated_at.to_rfc3339(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| WikiSyncError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Number of documents currently stored.
    pub async fn document_count(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM documents", params![])
            .await
            .map_err(|e| WikiSyncError::Storage(e.to_string()))?;

        match rows
            .next()
            .await
            .map_err(|e| WikiSyncError::Storage(e.to_string()))?
        {
            Some(row) => row
                .get::<u64>(0)
                .map_err(|e| WikiSyncError::Storage(e.to_string())),
            None => Ok(0),
        }
    }

    // ------------------------------------------------------------------
    // Images
    // ------------------------------------------------------------------

    /// Persist image bytes under a deterministic key and return the
    /// reference used as a document section.
    pub async fn store_image(
        &self,
        page_full_name: &str,
        attachment_name: &str,
        media_type: &str,
        link: &str,
        data: &[u8],
    ) -> Result<ImageRef> {
        let key = image_store_key(page_full_name, attachment_name);

        self.conn
            .execute(
                "INSERT INTO images (key, name, media_type, link, data, stored_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(key) DO UPDATE SET
                     name = excluded.name,
                     media_type = excluded.media_type,
                     link = excluded.link,
                     data = excluded.data,
                     stored_at = excluded.stored_at",
                params![
                    key.as_str(),
                    attachment_name,
                    media_type,
                    link,
                    data.to_vec(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| WikiSyncError::Storage(e.to_string()))?;

        Ok(ImageRef {
            key,
            name: attachment_name.to_string(),
            media_type: media_type.to_string(),
        })
    }

    /// Fetch a stored image payload by key.
    pub async fn get_image(&self, key: &str) -> Result<Option<(Vec<u8>, String)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT data, media_type FROM images WHERE key = ?1",
                params![key],
            )
            .await
            .map_err(|e| WikiSyncError::Storage(e.to_string()))?;

        match rows
            .next()
            .await
            .map_err(|e| WikiSyncError::Storage(e.to_string()))?
        {
            Some(row) => {
                let data: Vec<u8> = row
                    .get(0)
                    .map_err(|e| WikiSyncError::Storage(e.to_string()))?;
                let media_type: String = row
                    .get(1)
                    .map_err(|e| WikiSyncError::Storage(e.to_string()))?;
                Ok(Some((data, media_type)))
            }
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Sync run history
    // ------------------------------------------------------------------

    /// Record the start of a sync run; returns the run id.
    pub async fn insert_sync_run(&self) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        self.conn
            .execute(
                "INSERT INTO sync_runs (id, started_at) VALUES (?1, ?2)",
                params![id.as_str(), Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| WikiSyncError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// Mark a sync run finished with its stats.
    pub async fn finish_sync_run(&self, id: &str, stats_json: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE sync_runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![Utc::now().to_rfc3339(), stats_json, id],
            )
            .await
            .map_err(|e| WikiSyncError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Most recent sync runs, newest first.
    pub async fn recent_sync_runs(&self, limit: u32) -> Result<Vec<SyncRunSummary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, started_at, finished_at, stats_json
                 FROM sync_runs ORDER BY started_at DESC LIMIT ?1",
                params![limit as i64],
            )
            .await
            .map_err(|e| WikiSyncError::Storage(e.to_string()))?;

        let mut runs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| WikiSyncError::Storage(e.to_string()))?
        {
            runs.push(SyncRunSummary {
                id: row
                    .get(0)
                    .map_err(|e| WikiSyncError::Storage(e.to_string()))?,
                started_at: row
                    .get(1)
                    .map_err(|e| WikiSyncError::Storage(e.to_string()))?,
                finished_at: nullable_text(&row, 2)?,
                stats_json: nullable_text(&row, 3)?,
            });
        }
        Ok(runs)
    }
}

/// Read a nullable TEXT column.
fn nullable_text(row: &libsql::Row, idx: i32) -> Result<Option<String>> {
    match row
        .get_value(idx)
        .map_err(|e| WikiSyncError::Storage(e.to_string()))?
    {
        libsql::Value::Text(text) => Ok(Some(text)),
        libsql::Value::Null => Ok(None),
        other => Err(WikiSyncError::Storage(format!(
            "unexpected value in text column {idx}: {other:?}"
        ))),
    }
}

/// Deterministic store key for an image attachment.
///
/// Combines the page full name and attachment file name, with separator
/// characters sanitized so the key stays usable as a file or URL segment.
pub fn image_store_key(page_full_name: &str, attachment_name: &str) -> String {
    let safe_page = sanitize(page_full_name);
    let safe_name = sanitize(attachment_name);
    format!("wiki-{safe_page}-{safe_name}")
}

fn sanitize(value: &str) -> String {
    value.replace([':', '/'], "_")
}

/// SHA-256 hash of serialized content, hex-encoded.
fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
