//! Model Dispatcher (§4.5): routes every LLM call through one of four
//! logical tiers, bounds concurrency per mission, retries transient
//! provider failures with backoff, and turns every completed call into a
//! [`UsageRecord`] for the Usage Meter.
//!
//! Grounded in `agent::provider::LlmProvider` (the narrow transport
//! trait) and the `Semaphore`-per-resource concurrency style of the
//! teacher's `Orchestrator::fan_out`; tier routing and retry/backoff are
//! new logic layered over the existing `ChatRequest`/`ChatResponse`
//! types.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::warn;

use crate::core::UsageRecord;
use crate::error::AgentError;

use super::config::DispatcherConfig;
use super::message::{ChatMessage, ChatRequest, ChatResponse};
use super::provider::LlmProvider;

/// A logical model slot with a per-user provider+model binding.
///
/// Discriminants double as an index into [`DispatcherConfig::tiers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelTier {
    /// Cheap, low-latency calls: note extraction, simple classification.
    Fast = 0,
    /// Everyday agent calls: research summarization, section writing.
    Mid = 1,
    /// Planning, outline generation, reflection over the full mission.
    Intelligent = 2,
    /// Self-checking / adversarial verification passes.
    Verifier = 3,
}

/// Backoff schedule for transient provider failures: `200ms, 400ms,
/// 800ms, ...` capped at four steps regardless of `max_retries`.
const BACKOFF_BASE_MS: u64 = 200;

/// The Model Dispatcher: tier routing, a per-mission semaphore, and
/// retry/backoff over a pluggable [`LlmProvider`].
pub struct ModelDispatcher {
    provider: Arc<dyn LlmProvider>,
    config: DispatcherConfig,
    semaphore: Arc<Semaphore>,
}

impl ModelDispatcher {
    /// Creates a dispatcher backed by `provider`, with a per-mission
    /// semaphore sized from `config.max_concurrent_requests`.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, config: DispatcherConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_requests.max(1)));
        Self {
            provider,
            config,
            semaphore,
        }
    }

    /// Maximum tool-calling loop iterations an agent unit should allow
    /// before aborting with [`AgentError::ToolLoopExceeded`].
    #[must_use]
    pub const fn max_tool_iterations(&self) -> usize {
        self.config.max_tool_iterations
    }

    /// Dispatches a chat completion on `tier`, returning the response
    /// plus a [`UsageRecord`] for the Usage Meter.
    ///
    /// Acquires a permit from the per-mission semaphore before issuing
    /// the request (§4.2); retries network/5xx-shaped errors with
    /// exponential backoff up to `config.max_retries` attempts; fails
    /// fast on anything else (auth, quota, malformed request).
    ///
    /// # Errors
    ///
    /// Returns the last [`AgentError`] encountered once retries are
    /// exhausted, or immediately for non-retryable errors.
    pub async fn dispatch(
        &self,
        tier: ModelTier,
        messages: Vec<ChatMessage>,
        tools: Vec<crate::tools::ToolDefinition>,
        json_mode: bool,
    ) -> Result<(ChatResponse, UsageRecord), AgentError> {
        let binding = self.config.binding(tier);
        let request = ChatRequest {
            model: binding.model_name.clone(),
            messages,
            temperature: Some(0.2),
            max_tokens: Some(4096),
            json_mode,
            stream: false,
            tools,
        };

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| AgentError::Orchestration(format!("semaphore closed: {e}")))?;

        if !self.config.request_delay.is_zero() {
            tokio::time::sleep(self.config.request_delay).await;
        }

        let mut attempt = 0u32;
        loop {
            let start = Instant::now();
            let outcome = tokio::time::timeout(self.config.timeout, self.provider.chat(&request))
                .await
                .map_err(|_| AgentError::Timeout {
                    timeout_secs: self.config.timeout.as_secs(),
                });

            let result = match outcome {
                Ok(inner) => inner,
                Err(timeout_err) => Err(timeout_err),
            };

            match result {
                Ok(response) => {
                    let duration_sec = start.elapsed().as_secs_f64();
                    let usage = UsageRecord {
                        provider: self.provider.name().to_string(),
                        model_name: binding.model_name.clone(),
                        duration_sec,
                        prompt_tokens: Some(u64::from(response.usage.prompt_tokens)),
                        completion_tokens: Some(u64::from(response.usage.completion_tokens)),
                        native_tokens: None,
                        cost: None,
                    };
                    return Ok((response, usage));
                }
                Err(err) if is_retryable(&err) && attempt < self.config.max_retries => {
                    attempt += 1;
                    let backoff = Duration::from_millis(BACKOFF_BASE_MS * 2u64.pow(attempt.min(4)));
                    warn!(attempt, tier = ?tier, error = %err, "retrying after transient dispatcher error");
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Whether `err` represents a transient condition worth retrying:
/// network errors, timeouts, and provider-reported 5xx-shaped failures.
/// Auth and quota errors are not retried — they will not succeed on a
/// second attempt without operator intervention.
const fn is_retryable(err: &AgentError) -> bool {
    matches!(
        err,
        AgentError::ProviderNetwork(_) | AgentError::Timeout { .. }
    )
}

/// Per-mission / per-user dispatcher registry, keyed by an opaque
/// binding key (e.g. `user_id`) so each user's calls share one
/// semaphore while staying isolated from other users' (§5: "per-user
/// model-dispatch semaphore is shared across that user's missions,
/// isolated across users").
#[derive(Default)]
pub struct DispatcherRegistry {
    dispatchers: HashMap<String, Arc<ModelDispatcher>>,
}

impl DispatcherRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the dispatcher for `key`, inserting one built from
    /// `provider`/`config` if none exists yet.
    pub fn get_or_insert_with(
        &mut self,
        key: &str,
        provider: Arc<dyn LlmProvider>,
        config: DispatcherConfig,
    ) -> Arc<ModelDispatcher> {
        self.dispatchers
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(ModelDispatcher::new(provider, config)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::{system_message, user_message, TokenUsage};
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use futures_util::Stream;

    struct MockProvider {
        failures_then_success: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            let remaining = self.failures_then_success.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_then_success.fetch_sub(1, Ordering::SeqCst);
                return Err(AgentError::ProviderNetwork("connection reset".to_string()));
            }
            Ok(ChatResponse {
                content: "ok".to_string(),
                usage: TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                },
                tool_calls: Vec::new(),
                finish_reason: Some("stop".to_string()),
            })
        }

        async fn chat_stream(
            &self,
            _request: &ChatRequest,
        ) -> Result<Pin<Box<dyn Stream<Item = Result<String, AgentError>> + Send>>, AgentError>
        {
            Err(AgentError::Stream {
                message: "not implemented".to_string(),
            })
        }
    }

    fn test_config() -> DispatcherConfig {
        DispatcherConfig::builder()
            .api_key("test")
            .max_retries(3)
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|e| panic!("build failed: {e}"))
    }

    #[tokio::test]
    async fn test_dispatch_succeeds_on_first_try() {
        let provider = Arc::new(MockProvider {
            failures_then_success: AtomicUsize::new(0),
        });
        let dispatcher = ModelDispatcher::new(provider, test_config());
        let (response, usage) = dispatcher
            .dispatch(ModelTier::Fast, vec![system_message("s"), user_message("u")], Vec::new(), false)
            .await
            .unwrap_or_else(|e| panic!("dispatch failed: {e}"));
        assert_eq!(response.content, "ok");
        assert_eq!(usage.provider, "mock");
        assert_eq!(usage.prompt_tokens, Some(10));
    }

    #[tokio::test]
    async fn test_dispatch_retries_transient_errors() {
        let provider = Arc::new(MockProvider {
            failures_then_success: AtomicUsize::new(2),
        });
        let dispatcher = ModelDispatcher::new(provider, test_config());
        let (response, _usage) = dispatcher
            .dispatch(ModelTier::Mid, vec![user_message("u")], Vec::new(), false)
            .await
            .unwrap_or_else(|e| panic!("dispatch failed: {e}"));
        assert_eq!(response.content, "ok");
    }

    #[tokio::test]
    async fn test_dispatch_fails_fast_on_non_retryable() {
        struct AuthFailProvider;

        #[async_trait]
        impl LlmProvider for AuthFailProvider {
            fn name(&self) -> &'static str {
                "mock-auth-fail"
            }

            async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, AgentError> {
                Err(AgentError::ProviderAuth("invalid key".to_string()))
            }

            async fn chat_stream(
                &self,
                _request: &ChatRequest,
            ) -> Result<Pin<Box<dyn Stream<Item = Result<String, AgentError>> + Send>>, AgentError>
            {
                Err(AgentError::Stream {
                    message: "not implemented".to_string(),
                })
            }
        }

        let dispatcher = ModelDispatcher::new(Arc::new(AuthFailProvider), test_config());
        let result = dispatcher
            .dispatch(ModelTier::Fast, vec![user_message("u")], Vec::new(), false)
            .await;
        assert!(matches!(result, Err(AgentError::ProviderAuth(_))));
    }

    #[test]
    fn test_tier_indexes_config_bindings() {
        let config = test_config();
        assert_eq!(config.binding(ModelTier::Fast).model_name, "gpt-4o-mini");
        assert_eq!(config.binding(ModelTier::Intelligent).model_name, "gpt-4o");
    }
}
