//! Auto-Optimizer (§4.7): a one-shot Fast-tier LLM call run once at
//! mission start, proposing a partial settings override from the user's
//! request before the first structured phase begins.
//!
//! Not one of the six agent units — it needs no tool access and no
//! assembled [`crate::agent::AgentContext`], so it dispatches directly
//! through the [`ModelDispatcher`] rather than via a `ControllerView`.

use std::sync::Arc;

use crate::agent::message::{system_message, user_message};
use crate::agent::{ModelDispatcher, ModelTier, parse_json_response};
use crate::core::UsageRecord;
use crate::error::AgentError;

use super::settings::ResearchParamsOverride;

const SYSTEM_PROMPT: &str = "You tune research-mission parameters. Given a user's research \
request, propose a partial JSON object of overrides for only the fields you are confident \
should differ from the defaults for this request (for example structured_research_rounds, \
writing_passes, max_research_cycles_per_section). Omit any field you are not confident about; \
omitted fields fall back to the user's or the system's defaults. Respond with a single JSON \
object and nothing else.";

/// Proposes research-parameter overrides once per mission, at `start`.
pub struct AutoOptimizer;

impl AutoOptimizer {
    /// Dispatches the one-shot optimization call for `user_request`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on dispatch failure or an unparseable
    /// response body.
    pub async fn propose(
        dispatcher: &Arc<ModelDispatcher>,
        user_request: &str,
    ) -> Result<(ResearchParamsOverride, UsageRecord), AgentError> {
        let messages = vec![
            system_message(SYSTEM_PROMPT),
            user_message(&format!("User request:\n{user_request}")),
        ];
        let (response, usage) = dispatcher.dispatch(ModelTier::Fast, messages, Vec::new(), true).await?;
        let overrides: ResearchParamsOverride = parse_json_response(&response.content)?;
        Ok((overrides, usage))
    }
}
