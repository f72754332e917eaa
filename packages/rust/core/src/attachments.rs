//! Per-attachment policy engine.
//!
//! Every attachment on a page flows through [`process_attachment`]
//! independently: type validation, size/length thresholds, download, then
//! text extraction or image storage. Failures become an error outcome and
//! never cross the attachment boundary: sibling attachments and the parent
//! page are unaffected.

use tracing::warn;

use wikisync_client::WikiClient;
use wikisync_extract::{extract_file_text, is_accepted_file_ext, is_supported_image_type};
use wikisync_shared::{AttachmentRef, ImageRef, PageRecord, SyncConfig};
use wikisync_storage::Storage;

/// Thresholds and switches governing attachment processing.
#[derive(Debug, Clone)]
pub struct AttachmentPolicy {
    /// Whether image attachments are downloaded and stored at all.
    pub allow_images: bool,
    /// Declared-size ceiling for non-image attachments, in bytes.
    pub max_attachment_bytes: u64,
    /// Ceiling on extracted text, in characters. Exceeding it rejects the
    /// attachment outright instead of truncating.
    pub max_text_chars: usize,
}

impl Default for AttachmentPolicy {
    fn default() -> Self {
        Self {
            allow_images: false,
            max_attachment_bytes: 10 * 1024 * 1024,
            max_text_chars: 200_000,
        }
    }
}

impl From<&SyncConfig> for AttachmentPolicy {
    fn from(config: &SyncConfig) -> Self {
        Self {
            allow_images: config.allow_images,
            max_attachment_bytes: config.max_attachment_bytes,
            max_text_chars: config.max_text_chars,
        }
    }
}

/// Outcome of processing a single attachment: exactly one variant, always.
///
/// `Text(None)` is a processed attachment that yielded no text (an empty but
/// valid file); it is distinct from `Error`, which carries the reason the
/// attachment was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentOutcome {
    Text(Option<String>),
    Image(ImageRef),
    Error(String),
}

/// An outcome paired with the attachment's resolved download URL, ready for
/// document assembly.
#[derive(Debug, Clone)]
pub struct AttachmentResult {
    pub outcome: AttachmentOutcome,
    pub link: String,
}

/// Run one attachment through the policy pipeline.
pub async fn process_attachment(
    client: &WikiClient,
    store: &Storage,
    page: &PageRecord,
    attachment: &AttachmentRef,
    policy: &AttachmentPolicy,
) -> AttachmentOutcome {
    let media_type = attachment
        .mime_type
        .as_deref()
        .unwrap_or("")
        .to_ascii_lowercase();
    let is_image = media_type.starts_with("image/");

    if !validate_filetype(attachment, &media_type, is_image) {
        return AttachmentOutcome::Error(format!(
            "unsupported file type: {}",
            if media_type.is_empty() {
                &attachment.name
            } else {
                &media_type
            }
        ));
    }

    let download_url = client.attachment_download_url(attachment);

    if is_image {
        if !policy.allow_images {
            return AttachmentOutcome::Error("image downloading is not enabled".into());
        }
    } else {
        // Size gate applies to the declared size, before any download.
        let declared = attachment.size.unwrap_or(0);
        if declared > policy.max_attachment_bytes {
            warn!(
                url = %download_url,
                size = declared,
                threshold = policy.max_attachment_bytes,
                "skipping attachment over size threshold"
            );
            return AttachmentOutcome::Error("attachment exceeds size limit".into());
        }
    }

    let raw_bytes = match client.download_attachment(attachment).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(attachment = %attachment.name, error = %err, "attachment download failed");
            return AttachmentOutcome::Error(err.to_string());
        }
    };

    if raw_bytes.is_empty() {
        return AttachmentOutcome::Error("attachment content empty".into());
    }

    if is_image {
        return match store
            .store_image(
                &page.full_name,
                &attachment.name,
                &media_type,
                &download_url,
                &raw_bytes,
            )
            .await
        {
            Ok(image) => AttachmentOutcome::Image(image),
            Err(err) => {
                warn!(attachment = %attachment.name, error = %err, "image storage failed");
                AttachmentOutcome::Error(err.to_string())
            }
        };
    }

    let text = match extract_file_text(&raw_bytes, &attachment.name) {
        Ok(text) => text,
        Err(err) => {
            warn!(attachment = %attachment.name, error = %err, "text extraction failed");
            return AttachmentOutcome::Error(err.to_string());
        }
    };

    if text.len() > policy.max_text_chars {
        warn!(
            url = %download_url,
            chars = text.len(),
            threshold = policy.max_text_chars,
            "skipping attachment over text length threshold"
        );
        return AttachmentOutcome::Error("attachment text too long".into());
    }

    AttachmentOutcome::Text(if text.is_empty() { None } else { Some(text) })
}

/// Type validation: images must be in the accepted image allow-list;
/// anything else must carry a recognized text/document extension.
fn validate_filetype(attachment: &AttachmentRef, media_type: &str, is_image: bool) -> bool {
    if is_image {
        return is_supported_image_type(media_type);
    }
    match attachment.extension() {
        Some(ext) => is_accepted_file_ext(&ext),
        None => false,
    }
}
