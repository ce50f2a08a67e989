//! `ExecutionLogEntry` — an append-only audit trail of agent actions.

use serde::{Deserialize, Serialize};

use super::ids::LogId;

/// Outcome of a logged action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Success,
    Failure,
    Warning,
    Running,
}

/// One entry in a mission's execution log. Entries are append-only and
/// unique per `(mission_id, log_id)`; the Progress Bus treats delivery
/// of a given `log_id` as idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    /// Identifier, unique within the owning mission.
    pub log_id: LogId,
    /// Unix-epoch seconds when the action was logged.
    pub timestamp: i64,
    /// Name of the agent or component that performed the action.
    pub agent_name: String,
    /// Short description of the action taken.
    pub action: String,
    /// Outcome of the action.
    pub status: LogStatus,
    /// Truncated summary of the action's input, always present.
    pub input_summary: String,
    /// Truncated summary of the action's output, always present.
    pub output_summary: String,
    /// Full error message, if `status == Failure`.
    pub error_message: Option<String>,
    /// Untruncated input payload, kept only when small enough to be
    /// useful for debugging.
    pub full_input: Option<String>,
    /// Untruncated output payload, kept only when small enough to be
    /// useful for debugging.
    pub full_output: Option<String>,
    /// Model/provider details for LLM-backed actions.
    pub model_details: Option<String>,
    /// Tool calls issued during this action, serialized as JSON.
    pub tool_calls: Option<serde_json::Value>,
    /// Files read or written during this action.
    pub file_interactions: Option<Vec<String>>,
    /// Estimated cost in the provider's billing currency.
    pub cost: Option<f64>,
    /// Prompt tokens consumed, if this action called an LLM.
    pub prompt_tokens: Option<u64>,
    /// Completion tokens produced, if this action called an LLM.
    pub completion_tokens: Option<u64>,
    /// Provider-native token count, when it differs from the
    /// prompt/completion split (some providers report only a total).
    pub native_tokens: Option<u64>,
}

impl ExecutionLogEntry {
    /// Builds a minimal success entry with summaries only.
    #[must_use]
    pub fn success(
        log_id: LogId,
        timestamp: i64,
        agent_name: impl Into<String>,
        action: impl Into<String>,
        input_summary: impl Into<String>,
        output_summary: impl Into<String>,
    ) -> Self {
        Self {
            log_id,
            timestamp,
            agent_name: agent_name.into(),
            action: action.into(),
            status: LogStatus::Success,
            input_summary: input_summary.into(),
            output_summary: output_summary.into(),
            error_message: None,
            full_input: None,
            full_output: None,
            model_details: None,
            tool_calls: None,
            file_interactions: None,
            cost: None,
            prompt_tokens: None,
            completion_tokens: None,
            native_tokens: None,
        }
    }

    /// Builds a minimal failure entry.
    #[must_use]
    pub fn failure(
        log_id: LogId,
        timestamp: i64,
        agent_name: impl Into<String>,
        action: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        let mut entry = Self::success(log_id, timestamp, agent_name, action, String::new(), String::new());
        entry.status = LogStatus::Failure;
        entry.error_message = Some(error_message.into());
        entry
    }
}
