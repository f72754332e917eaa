//! Application configuration for WikiSync.
//!
//! User config lives at `~/.wikisync/wikisync.toml`.
//! CLI flags override config file values, which override defaults.
//! Credentials are never stored in the file; the config names the
//! environment variables that hold them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WikiSyncError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "wikisync.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".wikisync";

// ---------------------------------------------------------------------------
// Config structs (matching wikisync.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Wiki connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Sync scope filters.
    #[serde(default)]
    pub filters: FiltersConfig,

    /// Batch and attachment limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Local storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[connection]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Base URL of the wiki instance, e.g. `https://wiki.example.com/xwiki`.
    #[serde(default)]
    pub base_url: String,

    /// Wiki name to restrict the sync to (main wiki when unset).
    #[serde(default)]
    pub wiki: Option<String>,

    /// Name of the env var holding the username (never store the value).
    #[serde(default = "default_username_env")]
    pub username_env: String,

    /// Name of the env var holding the password (never store the value).
    #[serde(default = "default_password_env")]
    pub password_env: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            wiki: None,
            username_env: default_username_env(),
            password_env: default_password_env(),
        }
    }
}

fn default_username_env() -> String {
    "WIKISYNC_USERNAME".into()
}
fn default_password_env() -> String {
    "WIKISYNC_PASSWORD".into()
}

/// `[filters]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiltersConfig {
    /// Root page reference scoping the sync to a subtree or space,
    /// e.g. `Sandbox.WebHome` or `subwiki:Help.Macros`.
    #[serde(default)]
    pub root_page: Option<String>,

    /// Tag to sync by instead of a root page (mutually exclusive with it).
    #[serde(default)]
    pub tag: Option<String>,

    /// Whether a root page scopes to the space and all descendants.
    #[serde(default = "default_true")]
    pub recursive: bool,

    /// Whether image attachments are downloaded and stored.
    #[serde(default)]
    pub allow_images: bool,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            root_page: None,
            tag: None,
            recursive: default_true(),
            allow_images: false,
        }
    }
}

fn default_true() -> bool {
    true
}

/// `[limits]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Pages requested per search batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,

    /// Declared-size ceiling for non-image attachments, in bytes.
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,

    /// Ceiling on extracted attachment text, in characters.
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_attachment_bytes: default_max_attachment_bytes(),
            max_text_chars: default_max_text_chars(),
        }
    }
}

fn default_batch_size() -> u64 {
    500
}
fn default_max_attachment_bytes() -> u64 {
    10 * 1024 * 1024
}
fn default_max_text_chars() -> usize {
    200_000
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the local sync database.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.wikisync/wikisync.db".into()
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Username/password pair used to authenticate every wiki request.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Resolve credentials from the env vars named in the config.
///
/// Absence of either variable is a fatal precondition failure: the sync
/// must not issue a single request without credentials.
pub fn load_credentials(config: &AppConfig) -> Result<Credentials> {
    let read = |var: &str| -> Result<String> {
        match std::env::var(var) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Err(WikiSyncError::credentials(format!(
                "missing credential: set the {var} environment variable"
            ))),
        }
    };

    Ok(Credentials {
        username: read(&config.connection.username_env)?,
        password: read(&config.connection.password_env)?,
    })
}

// ---------------------------------------------------------------------------
// Sync config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime sync configuration — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Wiki name filter, if any.
    pub wiki: Option<String>,
    /// Root page reference, if any.
    pub root_page: Option<String>,
    /// Tag filter, if any.
    pub tag: Option<String>,
    /// Whether the root page scope includes descendants.
    pub recursive: bool,
    /// Whether image attachments are processed.
    pub allow_images: bool,
    /// Pages requested per search batch.
    pub batch_size: u64,
    /// Declared-size ceiling for non-image attachments, in bytes.
    pub max_attachment_bytes: u64,
    /// Ceiling on extracted attachment text, in characters.
    pub max_text_chars: usize,
}

impl From<&AppConfig> for SyncConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            wiki: config.connection.wiki.clone(),
            root_page: config.filters.root_page.clone(),
            tag: config.filters.tag.clone(),
            recursive: config.filters.recursive,
            allow_images: config.filters.allow_images,
            batch_size: config.limits.batch_size,
            max_attachment_bytes: config.limits.max_attachment_bytes,
            max_text_chars: config.limits.max_text_chars,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.wikisync/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| WikiSyncError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.wikisync/wikisync.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| WikiSyncError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| WikiSyncError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| WikiSyncError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| WikiSyncError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| WikiSyncError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
