//! Checkpointed batch iteration.
//!
//! [`SyncRunner`] drives one search batch at a time against the current
//! cursor and hands back the advanced cursor alongside the assembled
//! documents. The caller decides whether to keep iterating and is
//! responsible for persisting the cursor between batches; the runner never
//! writes cursor state itself.

use tracing::{info, instrument, warn};

use wikisync_client::WikiClient;
use wikisync_shared::{OutputDocument, PageRecord, Result, SyncConfig, SyncCursor, WikiSyncError};
use wikisync_storage::Storage;

use crate::assembler::assemble_document;
use crate::attachments::{AttachmentPolicy, AttachmentResult, process_attachment};

/// Result of one checkpointed batch.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Documents assembled from this batch, in modification order.
    pub documents: Vec<OutputDocument>,
    /// Raw search hits before translation filtering and drops.
    pub raw_hits: usize,
    /// The advanced cursor to persist and resume from.
    pub cursor: SyncCursor,
}

/// Drives checkpointed sync batches against one wiki.
pub struct SyncRunner<'a> {
    client: &'a WikiClient,
    store: &'a Storage,
    config: SyncConfig,
}

impl<'a> SyncRunner<'a> {
    pub fn new(client: &'a WikiClient, store: &'a Storage, config: SyncConfig) -> Self {
        Self {
            client,
            store,
            config,
        }
    }

    /// Probe the wiki with a one-item query to verify connectivity and
    /// filter configuration before a real sync.
    pub async fn validate_settings(&self) -> Result<()> {
        self.client
            .query_pages(
                self.config.wiki.as_deref(),
                self.config.root_page.as_deref(),
                self.config.tag.as_deref(),
                self.config.recursive,
                None,
                0,
                1,
            )
            .await
            .map_err(|e| {
                WikiSyncError::validation(format!("wiki settings validation failed: {e}"))
            })?;
        Ok(())
    }

    /// Fetch and process one batch at the given cursor position.
    ///
    /// Cursor transitions:
    /// - `offset` advances by the *raw* hit count, so dropped translations
    ///   and unresolvable hits still consume pagination budget and are never
    ///   re-fetched.
    /// - a full batch (`raw >= batch_size`) keeps the window open;
    /// - a short batch closes it: `offset` resets to 0 and the time window
    ///   advances to the newest modification seen, putting the next run
    ///   strictly after everything already processed.
    ///
    /// Per-page failures are logged and skipped; they never corrupt cursor
    /// bookkeeping or abort the batch.
    #[instrument(skip_all, fields(offset = cursor.offset, since_ms = cursor.since_ms))]
    pub async fn run_batch(
        &self,
        cursor: &SyncCursor,
        start_secs: Option<f64>,
    ) -> Result<BatchOutcome> {
        let mut cursor = cursor.clone();
        cursor.seed_start(start_secs);

        let (pages, raw_hits) = self
            .client
            .query_pages(
                self.config.wiki.as_deref(),
                self.config.root_page.as_deref(),
                self.config.tag.as_deref(),
                self.config.recursive,
                cursor.since_ms,
                cursor.offset,
                self.config.batch_size,
            )
            .await?;

        // Newest modification seen, tracked across all resolved pages even
        // when their document construction later fails.
        let mut max_modified = cursor.since_ms.unwrap_or(0);
        let mut documents = Vec::new();

        for page in &pages {
            if page.modified_ms > max_modified {
                max_modified = page.modified_ms;
            }

            match self.build_document(page).await {
                Ok(document) => documents.push(document),
                Err(err) => {
                    warn!(page = %page.full_name, error = %err, "failed to build document, skipping page");
                    continue;
                }
            }
        }

        cursor.offset += raw_hits as u64;
        cursor.has_more = raw_hits as u64 >= self.config.batch_size;

        if !cursor.has_more {
            cursor.offset = 0;
            if max_modified > 0 {
                cursor.since_ms = Some(max_modified);
            }
        }

        info!(
            raw_hits,
            documents = documents.len(),
            has_more = cursor.has_more,
            next_offset = cursor.offset,
            "batch complete"
        );

        Ok(BatchOutcome {
            documents,
            raw_hits,
            cursor,
        })
    }

    /// Run one page's attachments through the pipeline and assemble its
    /// document.
    async fn build_document(&self, page: &PageRecord) -> Result<OutputDocument> {
        let policy = AttachmentPolicy::from(&self.config);
        let mut results = Vec::with_capacity(page.attachments.len());

        for attachment in &page.attachments {
            let link = self.client.attachment_download_url(attachment);
            let outcome =
                process_attachment(self.client, self.store, page, attachment, &policy).await;
            results.push(AttachmentResult { outcome, link });
        }

        Ok(assemble_document(page, &results))
    }
}
