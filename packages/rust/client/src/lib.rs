//! Wiki REST/SOLR client: search gateway, page resolution, and downloads.
//!
//! This crate provides:
//! - [`query`] — search query construction from sync filters (no I/O)
//! - [`retry`] — the bounded-backoff policy wrapping every network call
//! - [`WikiClient`] — the authenticated HTTP gateway: paginated search,
//!   page detail resolution, content fetch, attachment download
//!
//! The client is constructed once with credentials and passed by reference
//! into each component; it is immutable after construction apart from the
//! HTTP connection pool inside `reqwest`.

pub mod query;
pub mod retry;

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use wikisync_extract::html_to_text;
use wikisync_shared::{AttachmentRef, Credentials, PageRecord, Result, WikiSyncError};

pub use query::{QueryScope, build_query};
pub use retry::RetryPolicy;

/// User-Agent string for wiki requests.
const USER_AGENT: &str = concat!("WikiSync/", env!("CARGO_PKG_VERSION"));

/// Fixed per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Relation identifying the canonical (non-translation) page link on a hit.
const REL_PAGE: &str = "http://www.xwiki.org/rel/page";

// ---------------------------------------------------------------------------
// WikiClient
// ---------------------------------------------------------------------------

/// Authenticated client for the wiki's REST and search endpoints.
pub struct WikiClient {
    base_url: Url,
    http: reqwest::Client,
    credentials: Credentials,
    retry: RetryPolicy,
}

impl WikiClient {
    /// Create a client for the wiki at `base_url`.
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self> {
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| WikiSyncError::config(format!("invalid base_url {base_url}: {e}")))?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| WikiSyncError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            http,
            credentials,
            retry: RetryPolicy::default(),
        })
    }

    /// Override the default retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    // ------------------------------------------------------------------
    // Search gateway
    // ------------------------------------------------------------------

    /// Run one paginated search batch and resolve each hit into a
    /// [`PageRecord`].
    ///
    /// Results are ordered by modification date ascending; pages modified
    /// mid-run sort after already-processed ones, which is what makes
    /// offset-based resumption safe under the time filter.
    ///
    /// Returns the resolved records plus the raw hit count *before*
    /// translation filtering and drops; cursor bookkeeping must advance by
    /// raw hits, not resolved records, or skipped hits would be re-fetched
    /// forever.
    #[instrument(skip_all, fields(start, number, wiki))]
    pub async fn query_pages(
        &self,
        wiki: Option<&str>,
        root_page: Option<&str>,
        tag: Option<&str>,
        recursive: bool,
        since_ms: Option<i64>,
        start: u64,
        number: u64,
    ) -> Result<(Vec<PageRecord>, usize)> {
        let (query, scope) = build_query(root_page, tag, recursive, since_ms);

        let mut params: Vec<(&str, String)> = vec![
            ("type", "solr".into()),
            ("start", start.to_string()),
            ("number", number.to_string()),
            ("distinct", "true".into()),
            ("orderField", "date".into()),
            ("order", "asc".into()),
            ("q", query),
        ];

        // An explicit wiki takes precedence over one extracted from root_page.
        let wiki_to_use = wiki.map(str::to_string).or(scope.wiki);
        if let Some(wiki) = wiki_to_use {
            params.push(("wikis", wiki));
        }

        let data = self.get_json("rest/wikis/query", &params).await?;

        let hits = match data.get("searchResults") {
            Some(Value::Array(hits)) => hits.as_slice(),
            _ => &[],
        };
        let raw_count = hits.len();

        let mut records = Vec::new();
        for hit in hits {
            if let Some(record) = self.resolve_hit(hit).await {
                records.push(record);
            }
        }

        debug!(raw_count, resolved = records.len(), "search batch resolved");
        Ok((records, raw_count))
    }

    /// Resolve one raw search hit into a page record.
    ///
    /// Translations and unresolvable hits return `None`; they are dropped
    /// from the batch without failing it and still count as raw hits.
    async fn resolve_hit(&self, hit: &Value) -> Option<PageRecord> {
        if is_translation(hit) {
            return None;
        }

        let detail_url = match page_detail_link(hit) {
            Some(url) => url,
            None => {
                warn!("search hit has no canonical page link, dropping");
                return None;
            }
        };

        let detail = match self.fetch_page_detail(&detail_url).await {
            Ok(detail) => detail,
            Err(err) => {
                warn!(url = %detail_url, error = %err, "failed to fetch page detail, dropping hit");
                return None;
            }
        };

        let id = string_field(&detail, "id");
        let full_name = string_field(&detail, "fullName");
        let page_url = string_field(&detail, "xwikiAbsoluteUrl");
        let modified_ms = detail.get("modified").and_then(Value::as_i64);

        let (Some(id), Some(full_name), Some(page_url), Some(modified_ms)) =
            (id, full_name, page_url, modified_ms)
        else {
            warn!(url = %detail_url, "page detail is missing required fields, dropping hit");
            return None;
        };

        let content = match self.fetch_page_text(&page_url).await {
            Ok(content) => content,
            Err(err) => {
                warn!(page = %full_name, error = %err, "failed to fetch page content, dropping hit");
                return None;
            }
        };

        let attachments = parse_attachments(detail.get("attachments"));

        Some(PageRecord {
            id,
            full_name,
            page_url,
            modified_ms,
            content,
            attachments,
        })
    }

    /// Fetch the page detail JSON, attachments included.
    async fn fetch_page_detail(&self, detail_url: &str) -> Result<Value> {
        self.get_json(detail_url, &[("attachments", "true".into())])
            .await
    }

    /// Fetch a page's content-only HTML and convert it to plain text.
    async fn fetch_page_text(&self, view_url: &str) -> Result<String> {
        let get_url = resolve_page_content_url(view_url)?;
        let html = self.get_text(&get_url, "text/html").await?;
        html_to_text(&html)
    }

    // ------------------------------------------------------------------
    // Attachments
    // ------------------------------------------------------------------

    /// Download an attachment's raw bytes.
    pub async fn download_attachment(&self, attachment: &AttachmentRef) -> Result<Vec<u8>> {
        let url = self.attachment_download_url(attachment);
        self.get_bytes(&url).await
    }

    /// Absolute download URL for an attachment.
    pub fn attachment_download_url(&self, attachment: &AttachmentRef) -> String {
        resolve_against(&self.base_url, &attachment.download_path)
    }

    // ------------------------------------------------------------------
    // HTTP plumbing
    // ------------------------------------------------------------------

    /// GET returning parsed JSON, with retry.
    async fn get_json(&self, target: &str, params: &[(&str, String)]) -> Result<Value> {
        self.retry
            .run(|| async move {
                let response = self.get_once(target, "application/json", params).await?;
                response
                    .json::<Value>()
                    .await
                    .map_err(|e| WikiSyncError::parse(format!("invalid JSON from {target}: {e}")))
            })
            .await
    }

    /// GET returning the response body as text, with retry.
    async fn get_text(&self, target: &str, accept: &str) -> Result<String> {
        self.retry
            .run(|| async move {
                let response = self.get_once(target, accept, &[]).await?;
                response
                    .text()
                    .await
                    .map_err(|e| WikiSyncError::Network(format!("body read from {target}: {e}")))
            })
            .await
    }

    /// GET returning raw bytes, with retry.
    async fn get_bytes(&self, target: &str) -> Result<Vec<u8>> {
        self.retry
            .run(|| async move {
                let response = self.get_once(target, "*/*", &[]).await?;
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| WikiSyncError::Network(format!("body read from {target}: {e}")))?;
                Ok(bytes.to_vec())
            })
            .await
    }

    /// One authenticated GET attempt with status classification.
    ///
    /// 401 is an authentication failure and must never be retried; any other
    /// non-2xx status is an unexpected (retryable) response.
    async fn get_once(
        &self,
        target: &str,
        accept: &str,
        params: &[(&str, String)],
    ) -> Result<reqwest::Response> {
        let url = resolve_against(&self.base_url, target);

        let mut request = self
            .http
            .get(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .header(reqwest::header::ACCEPT, accept);
        if !params.is_empty() {
            request = request.query(params);
        }

        let response = request
            .send()
            .await
            .map_err(|e| WikiSyncError::Network(format!("GET {url}: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(WikiSyncError::Auth(format!(
                "authentication failed calling {url}"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(500).collect();
            return Err(WikiSyncError::UnexpectedResponse(format!(
                "status {status} for GET {url}: {snippet}"
            )));
        }

        Ok(response)
    }
}

// ---------------------------------------------------------------------------
// Hit / detail parsing helpers
// ---------------------------------------------------------------------------

/// A hit with a non-empty language marker is a translation of a page already
/// represented by its default-language revision.
fn is_translation(hit: &Value) -> bool {
    match hit.get("language") {
        None | Some(Value::Null) => false,
        Some(Value::String(lang)) => !(lang.is_empty() || lang == "null"),
        Some(_) => false,
    }
}

/// Find the canonical page detail link on a hit.
///
/// Instances differ in envelope shape (`links` array, `link` object, or a
/// `{"links": {"link": [...]}}` nesting); translation links share the same
/// rel and are excluded by their `/translations/` path segment.
fn page_detail_link(hit: &Value) -> Option<String> {
    let links = hit.get("links").or_else(|| hit.get("link"))?;

    let entries: Vec<&Value> = match links {
        Value::Array(list) => list.iter().collect(),
        Value::Object(map) => match map.get("link") {
            Some(Value::Array(list)) => list.iter().collect(),
            Some(single @ Value::Object(_)) => vec![single],
            _ => vec![links],
        },
        _ => return None,
    };

    for entry in entries {
        let rel = entry.get("rel").and_then(Value::as_str);
        let href = entry.get("href").and_then(Value::as_str).unwrap_or("");
        if rel == Some(REL_PAGE) && !href.contains("/translations/") {
            return Some(href.to_string());
        }
    }

    None
}

/// Parse the attachment list out of a page detail payload.
///
/// Accepts a bare array or an `attachments`/`attachment` envelope. Entries
/// without a name or a download URL are skipped.
fn parse_attachments(value: Option<&Value>) -> Vec<AttachmentRef> {
    let entries: &[Value] = match value {
        Some(Value::Array(list)) => list,
        Some(Value::Object(map)) => match map.get("attachments").or_else(|| map.get("attachment")) {
            Some(Value::Array(list)) => list,
            _ => &[],
        },
        _ => &[],
    };

    let mut attachments = Vec::new();
    for entry in entries {
        let Some(name) = string_field(entry, "name") else {
            continue;
        };
        let download_path = string_field(entry, "xwikiAbsoluteUrl")
            .or_else(|| string_field(entry, "download"));
        let Some(download_path) = download_path else {
            warn!(attachment = %name, "attachment entry has no download URL, skipping");
            continue;
        };

        attachments.push(AttachmentRef {
            name,
            size: entry.get("size").and_then(Value::as_u64),
            mime_type: string_field(entry, "mimeType"),
            download_path,
            version: string_field(entry, "version"),
            digest: string_field(entry, "digest"),
        });
    }
    attachments
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Convert a wiki `view` URL to the matching content-only `get` URL.
pub fn resolve_page_content_url(view_url: &str) -> Result<String> {
    let mut url = Url::parse(view_url)
        .map_err(|e| WikiSyncError::parse(format!("invalid page URL {view_url}: {e}")))?;

    let path = url.path().to_string();
    let new_path = if path.contains("/bin/view/") {
        path.replace("/bin/view/", "/bin/get/")
    } else if path.contains("/wiki/") {
        path.replacen("/view/", "/get/", 1)
    } else {
        path
    };

    url.set_path(&new_path);
    url.set_query(Some("xpage=plain&viewer=content&outputSyntax=html"));
    Ok(url.to_string())
}

/// Resolve a target that may be absolute, or a path relative to the base.
fn resolve_against(base: &Url, target: &str) -> String {
    if target.starts_with("http") {
        return target.to_string();
    }
    match base.join(target.trim_start_matches('/')) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}{}", base, target.trim_start_matches('/')),
    }
}
