//! Document assembly.
//!
//! Maps one resolved page plus its ordered attachment results into the
//! normalized output document. The page body always leads; attachments
//! contribute a section each only when they produced text or an image.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use wikisync_shared::{OutputDocument, PageRecord, Section};

use crate::attachments::{AttachmentOutcome, AttachmentResult};

/// Assemble the output document for a page.
pub fn assemble_document(page: &PageRecord, results: &[AttachmentResult]) -> OutputDocument {
    let mut sections = vec![Section::Text {
        text: page.content.clone(),
        link: page.page_url.clone(),
    }];

    for result in results {
        match &result.outcome {
            AttachmentOutcome::Text(Some(text)) => sections.push(Section::Text {
                text: text.clone(),
                link: result.link.clone(),
            }),
            AttachmentOutcome::Image(image) => sections.push(Section::Image {
                image: image.clone(),
                link: result.link.clone(),
            }),
            // Empty-but-valid files and failed attachments contribute nothing.
            AttachmentOutcome::Text(None) | AttachmentOutcome::Error(_) => {}
        }
    }

    let mut metadata = BTreeMap::new();
    metadata.insert("name".to_string(), page.full_name.clone());

    let updated_at = DateTime::<Utc>::from_timestamp_millis(page.modified_ms).unwrap_or_default();

    debug!(
        page = %page.full_name,
        sections = sections.len(),
        "document assembled"
    );

    OutputDocument {
        id: page.id.clone(),
        title: page.full_name.clone(),
        semantic_identifier: page.full_name.clone(),
        sections,
        metadata,
        updated_at,
    }
}
