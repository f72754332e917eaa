//! Core sync pipeline for WikiSync.
//!
//! This crate ties the client, extraction, and storage layers together into
//! the checkpointed sync flow: batched search, per-attachment processing,
//! and document assembly.

pub mod assembler;
pub mod attachments;
pub mod sync;

pub use assembler::assemble_document;
pub use attachments::{AttachmentOutcome, AttachmentPolicy, AttachmentResult, process_attachment};
pub use sync::{BatchOutcome, SyncRunner};
