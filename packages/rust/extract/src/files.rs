//! Attachment file-type policy and text extraction.
//!
//! Extraction is pure: (bytes, file name) in, text out. Unsupported
//! extensions and undecodable payloads are errors for the caller to record,
//! not panics and not partial output.

use tracing::debug;

use wikisync_shared::{Result, WikiSyncError};

use crate::html::html_to_text;

/// Image media types we accept for storage.
const ACCEPTED_IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

/// File extensions treated as markup and routed through HTML conversion.
const MARKUP_EXTENSIONS: &[&str] = &[".html", ".htm", ".xhtml"];

/// File extensions decoded directly as UTF-8 text.
const PLAIN_EXTENSIONS: &[&str] = &[
    ".txt", ".md", ".markdown", ".mdx", ".rst", ".csv", ".tsv", ".json", ".xml", ".yaml", ".yml",
    ".log", ".conf", ".ini", ".properties",
];

/// Whether an image media type is in the accepted allow-list.
pub fn is_supported_image_type(media_type: &str) -> bool {
    let lowered = media_type.to_ascii_lowercase();
    // Parameters like `; charset=` are not expected on image types, but be tolerant
    let bare = lowered.split(';').next().unwrap_or("").trim().to_string();
    ACCEPTED_IMAGE_TYPES.contains(&bare.as_str())
}

/// Whether a (lowercased, dot-prefixed) file extension is extractable.
pub fn is_accepted_file_ext(ext: &str) -> bool {
    MARKUP_EXTENSIONS.contains(&ext) || PLAIN_EXTENSIONS.contains(&ext)
}

/// Extract text from attachment bytes, dispatching on the file extension.
pub fn extract_file_text(bytes: &[u8], file_name: &str) -> Result<String> {
    let ext = file_extension(file_name).ok_or_else(|| {
        WikiSyncError::Extract(format!("no extension on attachment {file_name}"))
    })?;

    if MARKUP_EXTENSIONS.contains(&ext.as_str()) {
        let html = decode_utf8(bytes, file_name)?;
        return html_to_text(&html);
    }

    if PLAIN_EXTENSIONS.contains(&ext.as_str()) {
        let text = decode_utf8(bytes, file_name)?;
        debug!(file_name, chars = text.len(), "extracted plain text");
        return Ok(text);
    }

    Err(WikiSyncError::Extract(format!(
        "unsupported attachment type {ext} ({file_name})"
    )))
}

/// Lowercased extension including the dot, if present.
fn file_extension(name: &str) -> Option<String> {
    let idx = name.rfind('.')?;
    if idx == 0 || idx + 1 == name.len() {
        return None;
    }
    Some(name[idx..].to_ascii_lowercase())
}

/// Strict UTF-8 decode; corrupt payloads are extraction errors.
fn decode_utf8(bytes: &[u8], file_name: &str) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| WikiSyncError::Extract(format!("{file_name} is not valid UTF-8")))
}
