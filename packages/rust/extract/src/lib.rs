//! Text extraction for WikiSync: HTML pages and binary attachments.
//!
//! This crate provides the two pure extraction functions the sync engine
//! consumes:
//! - [`html_to_text`] — rendered wiki HTML → normalized plain text
//! - [`extract_file_text`] — (attachment bytes, file name) → extracted text
//!
//! plus the allow-lists deciding which attachment types are processable.

mod files;
mod html;

pub use files::{extract_file_text, is_accepted_file_ext, is_supported_image_type};
pub use html::html_to_text;
