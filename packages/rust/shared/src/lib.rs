//! Shared types, error model, and configuration for WikiSync.
//!
//! This crate is the foundation depended on by all other WikiSync crates.
//! It provides:
//! - [`WikiSyncError`] — the unified error type
//! - Domain types ([`SyncCursor`], [`PageRecord`], [`OutputDocument`])
//! - Configuration ([`AppConfig`], [`SyncConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ConnectionConfig, Credentials, FiltersConfig, LimitsConfig, StorageConfig,
    SyncConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    load_credentials,
};
pub use error::{Result, WikiSyncError};
pub use types::{AttachmentRef, ImageRef, OutputDocument, PageRecord, Section, SyncCursor};
