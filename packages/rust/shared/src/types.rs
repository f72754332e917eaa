//! Core domain types for WikiSync.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SyncCursor
// ---------------------------------------------------------------------------

/// Persisted progress marker for incremental sync.
///
/// `offset` is always relative to the current `since_ms` window: whenever
/// `since_ms` moves, `offset` must be reset to 0 in the same transition.
/// The cursor has no terminal state; it stays valid across runs indefinitely
/// and is stored between runs by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    /// Inclusive lower bound on page modification time (epoch milliseconds).
    /// `None` until the first completed window.
    #[serde(rename = "time_threshold_ms")]
    pub since_ms: Option<i64>,
    /// Pagination offset into the search results for the current window.
    pub offset: u64,
    /// Whether the last batch looked full, i.e. more results may remain
    /// at this cursor position.
    pub has_more: bool,
}

impl SyncCursor {
    /// Cursor for a brand-new sync: no time window, offset 0.
    pub fn new() -> Self {
        Self {
            since_ms: None,
            offset: 0,
            has_more: true,
        }
    }

    /// Seed the time window from a caller-supplied start bound (epoch
    /// seconds). Only applies when no window has been established yet.
    pub fn seed_start(&mut self, start_secs: Option<f64>) {
        if self.since_ms.is_some() {
            return;
        }
        if let Some(start) = start_secs {
            if start > 0.0 {
                self.since_ms = Some((start * 1000.0) as i64);
            }
        }
    }
}

impl Default for SyncCursor {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// PageRecord / AttachmentRef
// ---------------------------------------------------------------------------

/// A fully resolved wiki page from one search batch.
///
/// One record per non-translation page revision; immutable once constructed.
#[derive(Debug, Clone)]
pub struct PageRecord {
    /// Wiki-global page identifier, e.g. `xwiki:Sandbox.WebHome`.
    pub id: String,
    /// Dotted full name, e.g. `Sandbox.WebHome`.
    pub full_name: String,
    /// Canonical absolute URL of the page (the non-translation view URL).
    pub page_url: String,
    /// Last modification time in epoch milliseconds.
    pub modified_ms: i64,
    /// Page body as normalized plain text.
    pub content: String,
    /// Attachments declared on the page.
    pub attachments: Vec<AttachmentRef>,
}

/// A retrievable binary resource tied to a page.
#[derive(Debug, Clone)]
pub struct AttachmentRef {
    /// File name as stored on the wiki.
    pub name: String,
    /// Declared size in bytes, when the wiki reports one.
    pub size: Option<u64>,
    /// Declared media type, when the wiki reports one.
    pub mime_type: Option<String>,
    /// Download URL or server-relative download path.
    pub download_path: String,
    /// Attachment version string.
    pub version: Option<String>,
    /// Server-side content digest.
    pub digest: Option<String>,
}

impl AttachmentRef {
    /// Lowercased file extension including the dot, if the name has one.
    pub fn extension(&self) -> Option<String> {
        let idx = self.name.rfind('.')?;
        if idx == 0 || idx + 1 == self.name.len() {
            return None;
        }
        Some(self.name[idx..].to_ascii_lowercase())
    }
}

// ---------------------------------------------------------------------------
// OutputDocument
// ---------------------------------------------------------------------------

/// Reference to an image payload persisted in the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Deterministic store key derived from page and attachment names.
    pub key: String,
    /// Original attachment file name.
    pub name: String,
    /// Media type of the stored payload.
    pub media_type: String,
}

/// One section of an assembled document: either a span of text or a stored
/// image, each linked back to its source URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Section {
    Text { text: String, link: String },
    Image { image: ImageRef, link: String },
}

/// The normalized document derived from one page plus its attachment
/// outcomes. Assembled fresh per page; never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDocument {
    /// Stable document identifier (the wiki page id).
    pub id: String,
    /// Display title.
    pub title: String,
    /// Human-meaningful identifier used by downstream consumers.
    pub semantic_identifier: String,
    /// Ordered sections: page body first, then one per surviving attachment.
    pub sections: Vec<Section>,
    /// Free-form metadata; carries at least the page display name.
    pub metadata: BTreeMap<String, String>,
    /// Page modification time as an absolute UTC instant.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_new_is_empty() {
        let cursor = SyncCursor::new();
        assert_eq!(cursor.since_ms, None);
        assert_eq!(cursor.offset, 0);
        assert!(cursor.has_more);
    }

    #[test]
    fn cursor_serde_roundtrip() {
        let cursor = SyncCursor {
            since_ms: Some(1_704_067_200_000),
            offset: 500,
            has_more: true,
        };
        let json = serde_json::to_string(&cursor).expect("serialize");
        assert!(json.contains("\"time_threshold_ms\":1704067200000"));
        let parsed: SyncCursor = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, cursor);
    }

    #[test]
    fn cursor_seed_start_converts_seconds() {
        let mut cursor = SyncCursor::new();
        cursor.seed_start(Some(1_704_067_200.0));
        assert_eq!(cursor.since_ms, Some(1_704_067_200_000));
    }

    #[test]
    fn cursor_seed_start_does_not_override_existing_window() {
        let mut cursor = SyncCursor {
            since_ms: Some(42),
            offset: 10,
            has_more: true,
        };
        cursor.seed_start(Some(1_704_067_200.0));
        assert_eq!(cursor.since_ms, Some(42));
    }

    #[test]
    fn attachment_extension() {
        let mut att = AttachmentRef {
            name: "Report.PDF".into(),
            size: None,
            mime_type: None,
            download_path: "/download/Report.PDF".into(),
            version: None,
            digest: None,
        };
        assert_eq!(att.extension().as_deref(), Some(".pdf"));

        att.name = "no-extension".into();
        assert_eq!(att.extension(), None);

        att.name = ".hidden".into();
        assert_eq!(att.extension(), None);
    }

    #[test]
    fn section_serde_is_tagged() {
        let section = Section::Text {
            text: "hello".into(),
            link: "https://wiki.example.com/bin/view/Main/".into(),
        };
        let json = serde_json::to_string(&section).expect("serialize");
        assert!(json.contains("\"kind\":\"text\""));
        let parsed: Section = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, section);
    }
}
