//! `UsageRecord` — per-call LLM usage accounting.

use serde::{Deserialize, Serialize};

/// Token/cost accounting for a single LLM call, attributable to a
/// mission for reporting and budget enforcement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Provider name (e.g. `"openai"`).
    pub provider: String,
    /// Model identifier as sent in the request.
    pub model_name: String,
    /// Wall-clock duration of the call, in seconds.
    pub duration_sec: f64,
    /// Prompt tokens, if reported by the provider.
    pub prompt_tokens: Option<u64>,
    /// Completion tokens, if reported by the provider.
    pub completion_tokens: Option<u64>,
    /// Provider-native total token count, when the provider does not
    /// split prompt/completion.
    pub native_tokens: Option<u64>,
    /// Estimated cost in the provider's billing currency.
    pub cost: Option<f64>,
}

impl UsageRecord {
    /// Returns the best available total token count: the sum of
    /// `prompt_tokens`/`completion_tokens` if both are present,
    /// otherwise `native_tokens`.
    #[must_use]
    pub fn total_tokens(&self) -> Option<u64> {
        match (self.prompt_tokens, self.completion_tokens) {
            (Some(p), Some(c)) => Some(p + c),
            _ => self.native_tokens,
        }
    }
}
