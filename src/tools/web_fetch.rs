//! Web Page Fetcher Tool (§4.4): fetches a URL, extracts readable text
//! and metadata, and caches the result on disk keyed by the SHA-256 of
//! the URL so repeated fetches within the cache TTL avoid a network
//! round-trip.
//!
//! The sidecar metadata file mirrors the original's cache record shape:
//! `{url, content_type, title, fetch_time_utc, extracted_metadata}`.
//! Writes are atomic (write to a temp file in the cache directory, then
//! rename) so a crash mid-fetch never leaves a half-written cache entry
//! for a concurrent fetch of the same URL to read.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::progress::{FeedbackKind, ProgressHandle};

use super::Tool;

/// How long a cached fetch stays valid before a re-fetch is attempted.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Largest response body the tool will download, guarding against
/// runaway downloads of e.g. large binaries mislabeled as text.
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct WebFetchInput {
    url: String,
    #[serde(default)]
    force_refresh: bool,
}

/// Sidecar metadata for one fetched URL, stored as
/// `<sha256(url)>.meta.json` alongside the raw `<sha256(url)>.cache`
/// body (§6's bit-exact on-disk layout).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheMeta {
    url: String,
    content_type: String,
    title: Option<String>,
    fetch_time_utc: String,
    extracted_metadata: serde_json::Map<String, Value>,
}

/// A fetched page: its sidecar metadata plus the extracted readable
/// text (not the raw bytes — those are only ever read back through
/// [`extract`], never re-parsed from cache on a hit).
#[derive(Debug, Clone)]
struct CacheEntry {
    meta: CacheMeta,
    content: String,
}

/// The Web Page Fetcher Tool: HTTP GET with a content-addressed disk
/// cache and best-effort readable-text extraction.
pub struct WebPageFetcherTool {
    client: reqwest::Client,
    cache_dir: PathBuf,
    ttl: Duration,
}

impl WebPageFetcherTool {
    /// Creates the tool, caching fetched pages under `cache_dir` with
    /// the default TTL.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new<P: AsRef<Path>>(cache_dir: P) -> Result<Self> {
        Self::with_ttl(cache_dir, DEFAULT_CACHE_TTL)
    }

    /// Creates the tool with an explicit cache TTL.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn with_ttl<P: AsRef<Path>>(cache_dir: P, ttl: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("mission-rs/0.1 (+https://github.com/mission-rs/mission-rs)")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| crate::error::ToolError::WebFetch {
                status: 0,
                message: e.to_string(),
                suggestion: "check the system TLS/network configuration".to_string(),
            })?;

        Ok(Self {
            client,
            cache_dir: cache_dir.as_ref().to_path_buf(),
            ttl,
        })
    }

    fn cache_key(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn body_path(&self, url: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.cache", Self::cache_key(url)))
    }

    fn meta_path(&self, url: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.meta.json", Self::cache_key(url)))
    }

    fn read_cache(&self, url: &str) -> Option<CacheEntry> {
        let meta_path = self.meta_path(url);
        let body_path = self.body_path(url);

        let metadata = std::fs::metadata(&meta_path).ok()?;
        let modified = metadata.modified().ok()?;
        if modified.elapsed().ok()? > self.ttl {
            return None;
        }

        let meta_raw = std::fs::read_to_string(&meta_path).ok()?;
        let meta: CacheMeta = serde_json::from_str(&meta_raw).ok()?;
        let body = std::fs::read(&body_path).ok()?;
        let (_, content, _) = extract(&meta.content_type, &body);

        Some(CacheEntry { meta, content })
    }

    /// Writes the raw body and sidecar metadata, each via a temp-file +
    /// rename so a concurrent reader never observes a partially written
    /// cache entry.
    fn write_cache(&self, url: &str, meta: &CacheMeta, body: &[u8]) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.cache_dir)?;
        let pid = std::process::id();

        let body_final = self.body_path(url);
        let body_tmp = self.cache_dir.join(format!("{}.cache.tmp-{pid}", Self::cache_key(url)));
        std::fs::write(&body_tmp, body)?;
        std::fs::rename(&body_tmp, &body_final)?;

        let meta_final = self.meta_path(url);
        let meta_tmp = self.cache_dir.join(format!("{}.meta.json.tmp-{pid}", Self::cache_key(url)));
        let serialized = serde_json::to_vec_pretty(meta).unwrap_or_default();
        std::fs::write(&meta_tmp, serialized)?;
        std::fs::rename(&meta_tmp, &meta_final)
    }

    async fn fetch_fresh(&self, url: &str) -> std::result::Result<(CacheEntry, Vec<u8>), (u16, String)> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| (0, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err((status.as_u16(), format!("request failed with status {status}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = response.bytes().await.map_err(|e| (0, e.to_string()))?;
        if bytes.len() > MAX_BODY_BYTES {
            return Err((0, format!("response body too large: {} bytes", bytes.len())));
        }

        let (title, content, extracted_metadata) = extract(&content_type, &bytes);

        let meta = CacheMeta {
            url: url.to_string(),
            content_type,
            title,
            fetch_time_utc: Utc::now().to_rfc3339(),
            extracted_metadata,
        };

        Ok((CacheEntry { meta, content }, bytes.to_vec()))
    }
}

fn extract(
    content_type: &str,
    bytes: &[u8],
) -> (Option<String>, String, serde_json::Map<String, Value>) {
    let mut metadata = serde_json::Map::new();

    if content_type.contains("application/pdf") {
        return match pdf_extract::extract_text_from_mem(bytes) {
            Ok(text) => {
                metadata.insert("format".to_string(), Value::String("pdf".to_string()));
                (None, text, metadata)
            }
            Err(e) => {
                metadata.insert("format".to_string(), Value::String("pdf".to_string()));
                metadata.insert("extraction_error".to_string(), Value::String(e.to_string()));
                (None, String::new(), metadata)
            }
        };
    }

    if content_type.contains("text/html") {
        let html = String::from_utf8_lossy(bytes).into_owned();
        let document = scraper::Html::parse_document(&html);

        let title = scraper::Selector::parse("title").ok().and_then(|sel| {
            document
                .select(&sel)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
        });

        let body_selector = scraper::Selector::parse("body").ok();
        let text = body_selector
            .and_then(|sel| document.select(&sel).next())
            .map(|el| {
                el.text()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_else(|| document.root_element().text().collect::<Vec<_>>().join("\n"));

        metadata.insert("format".to_string(), Value::String("html".to_string()));
        return (title, text, metadata);
    }

    metadata.insert("format".to_string(), Value::String("text".to_string()));
    (None, String::from_utf8_lossy(bytes).into_owned(), metadata)
}

#[async_trait]
impl Tool for WebPageFetcherTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetches a web page or document by URL and returns its extracted readable text and metadata."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "The URL to fetch."},
                "force_refresh": {"type": "boolean", "description": "Bypass the cache and re-fetch.", "default": false}
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, input: Value, progress: Option<&ProgressHandle>) -> Result<Value> {
        let args: WebFetchInput = match serde_json::from_value(input) {
            Ok(args) => args,
            Err(e) => {
                return Ok(serde_json::json!({ "error": format!("invalid web_fetch arguments: {e}") }));
            }
        };

        if let Some(progress) = progress {
            progress
                .feedback(FeedbackKind::WebFetchStart, serde_json::json!({"url": args.url}))
                .await;
        }

        if !args.force_refresh
            && let Some(cached) = self.read_cache(&args.url)
        {
            if let Some(progress) = progress {
                progress
                    .feedback(
                        FeedbackKind::WebFetchComplete,
                        serde_json::json!({"url": args.url, "cached": true}),
                    )
                    .await;
            }
            return Ok(serde_json::json!({
                "url": cached.meta.url,
                "content_type": cached.meta.content_type,
                "title": cached.meta.title,
                "fetch_time_utc": cached.meta.fetch_time_utc,
                "extracted_metadata": cached.meta.extracted_metadata,
                "content": cached.content,
                "cached": true,
            }));
        }

        match self.fetch_fresh(&args.url).await {
            Ok((entry, body)) => {
                if let Err(e) = self.write_cache(&args.url, &entry.meta, &body) {
                    tracing::warn!(url = %args.url, error = %e, "failed to write web fetch cache entry");
                }
                if let Some(progress) = progress {
                    progress
                        .feedback(
                            FeedbackKind::WebFetchComplete,
                            serde_json::json!({"url": args.url, "cached": false}),
                        )
                        .await;
                }
                Ok(serde_json::json!({
                    "url": entry.meta.url,
                    "content_type": entry.meta.content_type,
                    "title": entry.meta.title,
                    "fetch_time_utc": entry.meta.fetch_time_utc,
                    "extracted_metadata": entry.meta.extracted_metadata,
                    "content": entry.content,
                    "cached": false,
                }))
            }
            Err((status, message)) => {
                tracing::warn!(url = %args.url, status, error = %message, "web fetch failed");
                let suggestion = if status == 403 || status == 401 {
                    "the page may require authentication or block automated access".to_string()
                } else if status == 404 {
                    "the URL may be mistyped or the page no longer exists".to_string()
                } else {
                    "retry later or try a different source".to_string()
                };
                Ok(serde_json::json!({
                    "error": message,
                    "status": status,
                    "suggestion": suggestion,
                }))
            }
        }
    }
}
