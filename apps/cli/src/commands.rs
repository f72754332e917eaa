//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use wikisync_client::WikiClient;
use wikisync_core::SyncRunner;
use wikisync_shared::{
    AppConfig, SyncConfig, SyncCursor, init_config, load_config, load_config_from,
    load_credentials,
};
use wikisync_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// WikiSync — incremental wiki synchronization into normalized documents.
#[derive(Parser)]
#[command(
    name = "wikisync",
    version,
    about = "Sync wiki pages and attachments into a local document store, resumably.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to a config file (defaults to ~/.wikisync/wikisync.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run checkpointed sync batches until the wiki is drained.
    Sync {
        /// Wiki base URL (overrides config).
        #[arg(long, env = "WIKISYNC_BASE_URL")]
        base_url: Option<String>,

        /// Wiki name to restrict to (overrides config).
        #[arg(long)]
        wiki: Option<String>,

        /// Root page reference, e.g. "Sandbox.WebHome" (overrides config).
        #[arg(long)]
        root_page: Option<String>,

        /// Tag to sync by instead of a root page (overrides config).
        #[arg(long)]
        tag: Option<String>,

        /// Match the root space exactly instead of including descendants.
        #[arg(long)]
        no_recursive: bool,

        /// Download and store image attachments.
        #[arg(long)]
        allow_images: bool,

        /// Only sync pages modified at or after this time (epoch seconds).
        #[arg(long)]
        start: Option<f64>,

        /// Stop after this many batches (default: run until drained).
        #[arg(long)]
        max_batches: Option<u32>,

        /// Discard the persisted cursor and start from scratch.
        #[arg(long)]
        full: bool,
    },

    /// Probe the wiki to verify credentials and filter settings.
    Validate {
        /// Wiki base URL (overrides config).
        #[arg(long, env = "WIKISYNC_BASE_URL")]
        base_url: Option<String>,
    },

    /// Show cursor position, document count, and recent runs.
    Status,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = [
        "wikisync",
        "wikisync_shared",
        "wikisync_client",
        "wikisync_extract",
        "wikisync_core",
        "wikisync_storage",
    ]
    .map(|krate| format!("{krate}={level}"))
    .join(",");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Sync {
            base_url,
            wiki,
            root_page,
            tag,
            no_recursive,
            allow_images,
            start,
            max_batches,
            full,
        } => {
            let mut config = config;
            if let Some(base_url) = base_url {
                config.connection.base_url = base_url;
            }

            let mut sync = SyncConfig::from(&config);
            if wiki.is_some() {
                sync.wiki = wiki;
            }
            if root_page.is_some() {
                sync.root_page = root_page;
            }
            if tag.is_some() {
                sync.tag = tag;
            }
            if no_recursive {
                sync.recursive = false;
            }
            if allow_images {
                sync.allow_images = true;
            }

            cmd_sync(&config, sync, start, max_batches, full).await
        }
        Command::Validate { base_url } => {
            let mut config = config;
            if let Some(base_url) = base_url {
                config.connection.base_url = base_url;
            }
            cmd_validate(&config).await
        }
        Command::Status => cmd_status(&config).await,
        Command::Config { action } => match action {
            ConfigAction::Init => {
                let path = init_config()?;
                println!("Created {}", path.display());
                Ok(())
            }
            ConfigAction::Show => {
                let rendered = toml::to_string_pretty(&config)?;
                print!("{rendered}");
                Ok(())
            }
        },
    }
}

// ---------------------------------------------------------------------------
// sync
// ---------------------------------------------------------------------------

async fn cmd_sync(
    config: &AppConfig,
    sync: SyncConfig,
    start: Option<f64>,
    max_batches: Option<u32>,
    full: bool,
) -> Result<()> {
    require_base_url(config)?;

    let credentials = load_credentials(config)?;
    let client = WikiClient::new(&config.connection.base_url, credentials)?;
    let store = Storage::open(&db_path(config)?).await?;

    let connector = connector_key(config, &sync);
    let mut cursor = if full {
        SyncCursor::new()
    } else {
        store.load_cursor(&connector).await?.unwrap_or_default()
    };

    info!(
        base_url = %config.connection.base_url,
        connector = %connector,
        offset = cursor.offset,
        since_ms = cursor.since_ms,
        "starting sync"
    );

    let runner = SyncRunner::new(&client, &store, sync);
    let run_id = store.insert_sync_run().await?;

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::with_template("{spinner} {msg}").expect("valid progress template"),
    );

    let mut batches: u32 = 0;
    let mut documents: usize = 0;
    let mut raw_hits: usize = 0;

    loop {
        let outcome = runner.run_batch(&cursor, start).await?;

        for document in &outcome.documents {
            store.upsert_document(document).await?;
        }

        batches += 1;
        documents += outcome.documents.len();
        raw_hits += outcome.raw_hits;
        cursor = outcome.cursor;

        // Persist progress after every batch so an interrupted run resumes
        // exactly where it stopped.
        store.save_cursor(&connector, &cursor).await?;
        progress.set_message(format!("batch {batches}: {documents} documents"));

        if !cursor.has_more {
            break;
        }
        if let Some(max) = max_batches {
            if batches >= max {
                break;
            }
        }
    }

    let stats = serde_json::json!({
        "batches": batches,
        "documents": documents,
        "raw_hits": raw_hits,
        "has_more": cursor.has_more,
    });
    store.finish_sync_run(&run_id, &stats.to_string()).await?;

    progress.finish_and_clear();
    println!("Synced {documents} documents in {batches} batch(es).");
    if cursor.has_more {
        println!("More pages remain; run `wikisync sync` again to continue.");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// validate / status
// ---------------------------------------------------------------------------

async fn cmd_validate(config: &AppConfig) -> Result<()> {
    require_base_url(config)?;

    let credentials = load_credentials(config)?;
    let client = WikiClient::new(&config.connection.base_url, credentials)?;
    let store = Storage::open(&db_path(config)?).await?;

    let runner = SyncRunner::new(&client, &store, SyncConfig::from(config));
    runner.validate_settings().await?;

    println!("Connection and filter settings look good.");
    Ok(())
}

async fn cmd_status(config: &AppConfig) -> Result<()> {
    let store = Storage::open(&db_path(config)?).await?;

    let sync = SyncConfig::from(config);
    let connector = connector_key(config, &sync);

    match store.load_cursor(&connector).await? {
        Some(cursor) => {
            println!("Cursor: offset={} has_more={}", cursor.offset, cursor.has_more);
            match cursor.since_ms {
                Some(since_ms) => println!("Window: since {since_ms} ms"),
                None => println!("Window: unbounded (no completed run yet)"),
            }
        }
        None => println!("Cursor: none (never synced)"),
    }

    println!("Documents: {}", store.document_count().await?);

    let runs = store.recent_sync_runs(5).await?;
    if !runs.is_empty() {
        println!("Recent runs:");
        for run in runs {
            let finished = run.finished_at.as_deref().unwrap_or("(running)");
            let stats = run.stats_json.as_deref().unwrap_or("-");
            println!("  {} started {} finished {} {}", run.id, run.started_at, finished, stats);
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn require_base_url(config: &AppConfig) -> Result<()> {
    if config.connection.base_url.is_empty() {
        return Err(eyre!(
            "no wiki base URL configured; set [connection] base_url in the config \
             file or pass --base-url"
        ));
    }
    Ok(())
}

/// Database path with `~` expanded.
fn db_path(config: &AppConfig) -> Result<PathBuf> {
    Ok(expand_tilde(&config.storage.db_path))
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    Path::new(path).to_path_buf()
}

/// Cursor key for one connector configuration. Scope changes (different
/// root page, tag, or wiki) get independent cursors.
fn connector_key(config: &AppConfig, sync: &SyncConfig) -> String {
    let scope = sync
        .root_page
        .clone()
        .or_else(|| sync.tag.clone().map(|tag| format!("tag:{tag}")))
        .unwrap_or_else(|| "all".to_string());
    format!(
        "{}|{}|{}",
        config.connection.base_url,
        sync.wiki.as_deref().unwrap_or("-"),
        scope
    )
}
