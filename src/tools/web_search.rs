//! Web Search Tool (§4.4): abstracts over a configurable search
//! provider, enforcing the cross-mission rate ceiling from §4.2/§5 ("no
//! cross-mission locks beyond the global web-search rate limiter").
//!
//! Auth/quota/network failures never throw — they come back as part of
//! the tool's JSON output (`{"error": ...}`) with a `web_search_error`
//! feedback event, consistent with §4.4's "never throws" contract.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::warn;

use crate::error::Result;
use crate::progress::{FeedbackKind, ProgressHandle};

use super::Tool;

/// Maximum concurrent web search requests across all missions sharing a
/// [`WebSearchTool`] instance, mirroring the original's
/// `asyncio.Semaphore(2)` rate limiter.
pub const MAX_CONCURRENT_SEARCHES: usize = 2;

/// Minimum spacing between requests issued through one [`WebSearchTool`]
/// instance.
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(1);

/// An inclusive date range filter on search results (`YYYY-MM-DD`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateRange {
    /// Start date, inclusive.
    pub from_date: Option<String>,
    /// End date, inclusive.
    pub to_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebSearchInput {
    query: String,
    #[serde(default = "default_max_results")]
    max_results: usize,
    #[serde(flatten)]
    date_range: DateRange,
    include_domains: Option<Vec<String>>,
    exclude_domains: Option<Vec<String>>,
}

const fn default_max_results() -> usize {
    10
}

/// A single search hit as returned by the configured provider.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WebSearchHit {
    /// Result title.
    pub title: String,
    /// Result URL.
    pub url: String,
    /// Short snippet of the result's content.
    pub snippet: String,
}

/// Abstraction over a concrete web search provider (Tavily, LinkUp,
/// SearXNG, ... — all out of scope for this engine beyond this trait).
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Issues a search and returns up to `max_results` hits.
    ///
    /// # Errors
    ///
    /// Returns a user-facing error string, never a provider-specific
    /// error type, since [`WebSearchTool`] surfaces it verbatim.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        date_range: &DateRange,
        include_domains: Option<&[String]>,
        exclude_domains: Option<&[String]>,
    ) -> std::result::Result<Vec<WebSearchHit>, String>;
}

/// [`SearchProvider`] backed by the Brave Search API, the simplest of
/// the providers this trait was designed against (a single API key
/// header, JSON body, no OAuth dance) — grounded in
/// [`super::web_fetch::WebPageFetcherTool`]'s `reqwest::Client` setup.
pub struct BraveSearchProvider {
    client: reqwest::Client,
    api_key: String,
}

const BRAVE_SEARCH_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

impl BraveSearchProvider {
    /// Creates a provider authenticating with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ToolError::WebSearch`] if the underlying
    /// HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("mission-rs/0.1 (+https://github.com/mission-rs/mission-rs)")
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| crate::error::ToolError::WebSearch(e.to_string()))?;
        Ok(Self { client, api_key: api_key.into() })
    }
}

#[derive(Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWebResults>,
}

#[derive(Deserialize)]
struct BraveWebResults {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Deserialize)]
struct BraveResult {
    title: String,
    url: String,
    #[serde(default)]
    description: String,
}

#[async_trait]
impl SearchProvider for BraveSearchProvider {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        date_range: &DateRange,
        include_domains: Option<&[String]>,
        exclude_domains: Option<&[String]>,
    ) -> std::result::Result<Vec<WebSearchHit>, String> {
        let mut full_query = query.to_string();
        if let Some(domains) = include_domains {
            for domain in domains {
                full_query.push_str(&format!(" site:{domain}"));
            }
        }
        if let Some(domains) = exclude_domains {
            for domain in domains {
                full_query.push_str(&format!(" -site:{domain}"));
            }
        }

        let mut request = self
            .client
            .get(BRAVE_SEARCH_ENDPOINT)
            .header("X-Subscription-Token", &self.api_key)
            .header("Accept", "application/json")
            .query(&[("q", full_query.as_str()), ("count", &max_results.to_string())]);
        if let Some(from) = &date_range.from_date {
            request = request.query(&[("freshness", from.as_str())]);
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("brave search returned status {}", response.status()));
        }

        let body: BraveResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(body
            .web
            .map(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .take(max_results)
            .map(|r| WebSearchHit { title: r.title, url: r.url, snippet: r.description })
            .collect())
    }
}

struct RateLimiter {
    semaphore: Semaphore,
    last_request: std::sync::Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(permits: usize, min_interval: Duration) -> Self {
        Self {
            semaphore: Semaphore::new(permits),
            last_request: std::sync::Mutex::new(None),
            min_interval,
        }
    }

    async fn acquire_and_space(&self) {
        let _permit = self.semaphore.acquire().await;
        let wait = {
            let mut last = self.last_request.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let now = Instant::now();
            let wait = last
                .map(|prev| self.min_interval.saturating_sub(now.duration_since(prev)))
                .unwrap_or_default();
            *last = Some(now + wait);
            wait
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

/// The Web Search Tool: rate-limited, never-throwing search dispatch
/// over a configurable [`SearchProvider`].
pub struct WebSearchTool {
    provider: Arc<dyn SearchProvider>,
    limiter: Arc<RateLimiter>,
}

impl WebSearchTool {
    /// Creates the tool over a provider, with the spec-mandated
    /// cross-mission concurrency ceiling and request spacing.
    #[must_use]
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self {
            provider,
            limiter: Arc::new(RateLimiter::new(MAX_CONCURRENT_SEARCHES, MIN_REQUEST_INTERVAL)),
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Performs a web search using the configured provider to find up-to-date information."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The search query."},
                "max_results": {"type": "integer", "description": "Maximum number of results desired.", "default": 10},
                "from_date": {"type": "string", "description": "Start date filter, YYYY-MM-DD."},
                "to_date": {"type": "string", "description": "End date filter, YYYY-MM-DD."},
                "include_domains": {"type": "array", "items": {"type": "string"}},
                "exclude_domains": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: Value, progress: Option<&ProgressHandle>) -> Result<Value> {
        let args: WebSearchInput = match serde_json::from_value(input) {
            Ok(args) => args,
            Err(e) => return Ok(serde_json::json!({ "error": format!("invalid search arguments: {e}") })),
        };

        self.limiter.acquire_and_space().await;

        match self
            .provider
            .search(
                &args.query,
                args.max_results,
                &args.date_range,
                args.include_domains.as_deref(),
                args.exclude_domains.as_deref(),
            )
            .await
        {
            Ok(hits) => {
                if let Some(progress) = progress {
                    progress
                        .feedback(
                            FeedbackKind::WebSearchComplete,
                            serde_json::json!({"query": args.query, "num_results": hits.len()}),
                        )
                        .await;
                }
                Ok(serde_json::json!({ "results": hits }))
            }
            Err(message) => {
                warn!(query = %args.query, error = %message, "web search failed");
                if let Some(progress) = progress {
                    progress
                        .feedback(
                            FeedbackKind::WebSearchError,
                            serde_json::json!({"query": args.query, "message": message}),
                        )
                        .await;
                }
                Ok(serde_json::json!({ "error": message }))
            }
        }
    }
}
