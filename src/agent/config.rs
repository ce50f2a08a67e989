//! Dispatcher configuration: per-tier provider/model bindings plus the
//! concurrency, retry, and timeout knobs the Model Dispatcher (§4.5)
//! reads on every call.
//!
//! Resolved in the same order as the teacher's [`AgentConfig`]: explicit
//! builder values → environment variables → defaults.

use std::time::Duration;

use crate::error::AgentError;

use super::dispatcher::ModelTier;

/// Default maximum concurrent LLM requests per mission (§4.2's
/// per-mission semaphore).
const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 10;
/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Default max retries on transient provider errors.
const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default maximum tool-calling loop iterations for an agent unit.
const DEFAULT_MAX_TOOL_ITERATIONS: usize = 10;

/// A `(provider, model_name)` binding for one [`ModelTier`].
#[derive(Debug, Clone)]
pub struct TierBinding {
    /// Provider name (e.g. `"openai"`).
    pub provider: String,
    /// Model identifier as sent in requests.
    pub model_name: String,
}

/// Dispatcher configuration: tier bindings plus shared call parameters.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// API key for the configured provider(s).
    pub api_key: String,
    /// Optional base URL override (proxies, OpenAI-compatible APIs).
    pub base_url: Option<String>,
    /// Per-tier `(provider, model)` bindings.
    pub tiers: [TierBinding; 4],
    /// Permits for the per-mission semaphore (§4.2).
    pub max_concurrent_requests: usize,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts on transient (network/5xx) errors.
    pub max_retries: u32,
    /// Maximum tool-calling loop iterations before an agent unit aborts.
    pub max_tool_iterations: usize,
    /// Minimum delay applied after acquiring a dispatch permit, before
    /// issuing the request.
    pub request_delay: Duration,
    /// Directory containing prompt template overrides.
    pub prompt_dir: Option<std::path::PathBuf>,
}

impl DispatcherConfig {
    /// Returns the binding for `tier`.
    #[must_use]
    pub fn binding(&self, tier: ModelTier) -> &TierBinding {
        &self.tiers[tier as usize]
    }

    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> DispatcherConfigBuilder {
        DispatcherConfigBuilder::default()
    }

    /// Builds configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`DispatcherConfig`].
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    fast_model: Option<String>,
    mid_model: Option<String>,
    intelligent_model: Option<String>,
    verifier_model: Option<String>,
    max_concurrent_requests: Option<usize>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    max_tool_iterations: Option<usize>,
    request_delay: Option<Duration>,
    prompt_dir: Option<std::path::PathBuf>,
}

impl DispatcherConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("MISSION_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("MISSION_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("MISSION_BASE_URL"))
                .ok();
        }
        if self.fast_model.is_none() {
            self.fast_model = std::env::var("MISSION_FAST_MODEL").ok();
        }
        if self.mid_model.is_none() {
            self.mid_model = std::env::var("MISSION_MID_MODEL").ok();
        }
        if self.intelligent_model.is_none() {
            self.intelligent_model = std::env::var("MISSION_INTELLIGENT_MODEL").ok();
        }
        if self.verifier_model.is_none() {
            self.verifier_model = std::env::var("MISSION_VERIFIER_MODEL").ok();
        }
        if self.max_concurrent_requests.is_none() {
            self.max_concurrent_requests = std::env::var("MISSION_MAX_CONCURRENT_REQUESTS")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("MISSION_PROMPT_DIR").ok().map(std::path::PathBuf::from);
        }
        self
    }

    /// Sets the provider name used for every tier.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the Fast tier's model.
    #[must_use]
    pub fn fast_model(mut self, model: impl Into<String>) -> Self {
        self.fast_model = Some(model.into());
        self
    }

    /// Sets the Mid tier's model.
    #[must_use]
    pub fn mid_model(mut self, model: impl Into<String>) -> Self {
        self.mid_model = Some(model.into());
        self
    }

    /// Sets the Intelligent tier's model.
    #[must_use]
    pub fn intelligent_model(mut self, model: impl Into<String>) -> Self {
        self.intelligent_model = Some(model.into());
        self
    }

    /// Sets the Verifier tier's model.
    #[must_use]
    pub fn verifier_model(mut self, model: impl Into<String>) -> Self {
        self.verifier_model = Some(model.into());
        self
    }

    /// Sets the per-mission concurrency permits.
    #[must_use]
    pub const fn max_concurrent_requests(mut self, n: usize) -> Self {
        self.max_concurrent_requests = Some(n);
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the max retry attempts.
    #[must_use]
    pub const fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    /// Sets the max tool-calling loop iterations.
    #[must_use]
    pub const fn max_tool_iterations(mut self, n: usize) -> Self {
        self.max_tool_iterations = Some(n);
        self
    }

    /// Sets the minimum delay applied after acquiring a dispatch permit.
    #[must_use]
    pub const fn request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = Some(delay);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Builds the [`DispatcherConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set.
    pub fn build(self) -> Result<DispatcherConfig, AgentError> {
        let api_key = self.api_key.ok_or(AgentError::ApiKeyMissing)?;
        let provider = self.provider.unwrap_or_else(|| "openai".to_string());

        let binding = |model: Option<String>, default: &str| TierBinding {
            provider: provider.clone(),
            model_name: model.unwrap_or_else(|| default.to_string()),
        };

        Ok(DispatcherConfig {
            api_key,
            base_url: self.base_url,
            tiers: [
                binding(self.fast_model, "gpt-4o-mini"),
                binding(self.mid_model, "gpt-4o"),
                binding(self.intelligent_model, "gpt-4o"),
                binding(self.verifier_model, "gpt-4o-mini"),
            ],
            max_concurrent_requests: self
                .max_concurrent_requests
                .unwrap_or(DEFAULT_MAX_CONCURRENT_REQUESTS),
            timeout: self.timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            max_tool_iterations: self
                .max_tool_iterations
                .unwrap_or(DEFAULT_MAX_TOOL_ITERATIONS),
            request_delay: self.request_delay.unwrap_or(Duration::ZERO),
            prompt_dir: self.prompt_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = DispatcherConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|e| panic!("build failed: {e}"));
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.max_concurrent_requests, DEFAULT_MAX_CONCURRENT_REQUESTS);
        assert_eq!(config.binding(ModelTier::Fast).model_name, "gpt-4o-mini");
        assert_eq!(config.binding(ModelTier::Intelligent).model_name, "gpt-4o");
    }

    #[test]
    fn test_builder_missing_api_key() {
        assert!(DispatcherConfig::builder().build().is_err());
    }

    #[test]
    fn test_builder_custom_tier_models() {
        let config = DispatcherConfig::builder()
            .api_key("key")
            .fast_model("small")
            .verifier_model("checker")
            .max_concurrent_requests(4)
            .build()
            .unwrap_or_else(|e| panic!("build failed: {e}"));
        assert_eq!(config.binding(ModelTier::Fast).model_name, "small");
        assert_eq!(config.binding(ModelTier::Verifier).model_name, "checker");
        assert_eq!(config.max_concurrent_requests, 4);
    }
}
