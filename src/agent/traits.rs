//! The narrow interface agent units see (§9 Design Notes): "agents
//! receive a narrow 'Controller View' exposing only `log(...)`,
//! `context()`, `publish(...)`." This breaks the cyclic
//! controller↔agents↔tools reference the Mission Controller would
//! otherwise need: agents never touch [`crate::storage::Storage`]
//! directly, never see other missions' state, and cannot reach back into
//! the controller's phase-loop bookkeeping.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::core::{MissionId, Note, Pads, Plan};
use crate::error::AgentError;
use crate::progress::{Event, ProgressHandle};
use crate::tools::ToolRegistry;

use super::dispatcher::{ModelDispatcher, ModelTier};
use super::message::{assistant_tool_calls_message, tool_message, ChatMessage, ChatResponse};

/// A read-only snapshot of mission state an agent unit needs to act,
/// assembled by the Mission Controller from the Context Store before
/// dispatch (§4.1: "at each phase it assembles a context bundle from
/// F"). Agents never see more of the mission than this.
#[derive(Debug, Clone)]
pub struct AgentContext {
    /// The mission's current plan, if planning has completed.
    pub plan: Option<Plan>,
    /// Scratch state (goal/thought/agent pads).
    pub pads: Pads,
    /// Notes accumulated so far, relevant to the calling agent's scope.
    pub notes: Vec<Note>,
}

/// The capability surface handed to an agent unit for the duration of a
/// single call: dispatch an LLM request, call a tool, emit progress, and
/// read the assembled [`AgentContext`]. Everything else (persisting
/// results, advancing the phase loop) stays with the Mission Controller.
pub struct ControllerView {
    mission_id: MissionId,
    dispatcher: Arc<ModelDispatcher>,
    tools: Arc<ToolRegistry>,
    tool_selection: Vec<String>,
    progress: ProgressHandle,
    context: AgentContext,
}

impl ControllerView {
    /// Assembles a view for one agent call.
    #[must_use]
    pub fn new(
        mission_id: MissionId,
        dispatcher: Arc<ModelDispatcher>,
        tools: Arc<ToolRegistry>,
        tool_selection: Vec<String>,
        progress: ProgressHandle,
        context: AgentContext,
    ) -> Self {
        Self {
            mission_id,
            dispatcher,
            tools,
            tool_selection,
            progress,
            context,
        }
    }

    /// The mission this view is scoped to.
    #[must_use]
    pub const fn mission_id(&self) -> &MissionId {
        &self.mission_id
    }

    /// Read-only access to the assembled context bundle.
    #[must_use]
    pub const fn context(&self) -> &AgentContext {
        &self.context
    }

    /// Emits a Progress Bus event for this mission (`publish(...)`).
    pub async fn publish(&self, event: Event) {
        self.progress.emit(event).await;
    }

    /// Convenience alias for publishing an `Update` event carrying a full
    /// execution log entry (`log(...)`), the other half of the narrow
    /// interface named in the design notes.
    pub async fn log(&self, entry: crate::core::ExecutionLogEntry) {
        self.publish(Event::Update { entry: Some(entry) }).await;
    }

    /// Dispatches a chat completion on `tier` through the Model
    /// Dispatcher, honoring the per-mission semaphore and retry/backoff
    /// policy (§4.5).
    ///
    /// # Errors
    ///
    /// Returns the dispatcher's [`AgentError`] unchanged.
    pub async fn dispatch(
        &self,
        tier: ModelTier,
        messages: Vec<ChatMessage>,
        json_mode: bool,
    ) -> Result<(ChatResponse, crate::core::UsageRecord), AgentError> {
        let definitions = self.tools.definitions_for(&self.tool_selection);
        self.dispatcher.dispatch(tier, messages, definitions, json_mode).await
    }

    /// Maximum tool-calling loop iterations an agent unit should run
    /// before aborting with [`AgentError::ToolLoopExceeded`].
    #[must_use]
    pub const fn max_tool_iterations(&self) -> usize {
        self.dispatcher.max_tool_iterations()
    }

    /// Invokes a registered tool by name. Tool-level runtime failures
    /// never surface here as an `Err` (§7: tool errors never propagate
    /// upward) — only an unknown tool name does.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error`] if `name` is not registered.
    pub async fn call_tool(&self, name: &str, input: serde_json::Value) -> crate::error::Result<serde_json::Value> {
        self.tools.execute(name, input, Some(&self.progress)).await
    }
}

/// A stateless, polymorphic worker (component G): consumes a
/// [`ControllerView`] plus a typed `Input`, returns a typed `Output`
/// alongside the [`crate::core::UsageRecord`] its LLM call produced.
///
/// Agent units are never boxed as trait objects in this engine — the
/// Mission Controller calls each concrete unit by name — so an
/// associated `Input`/`Output` pair (rather than an object-safe generic
/// method) keeps each unit's contract precise.
#[async_trait::async_trait]
pub trait Agent: Send + Sync {
    /// The structured request this agent consumes.
    type Input: Send;
    /// The structured result this agent produces.
    type Output: Send;

    /// Name used in execution log entries and progress feedback.
    fn name(&self) -> &'static str;

    /// Runs one invocation of this agent.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on dispatch failure or unparseable output.
    async fn run(
        &self,
        view: &ControllerView,
        input: Self::Input,
    ) -> Result<(Self::Output, crate::core::UsageRecord), AgentError>;
}

/// Runs a dispatch/tool-call loop to completion: dispatches `messages` on
/// `tier`, and whenever the response carries tool calls, executes each
/// through [`ControllerView::call_tool`] and feeds the results back as
/// tool messages, repeating until the model stops requesting tools or
/// [`ControllerView::max_tool_iterations`] is exceeded.
///
/// Returns the final (tool-call-free) response plus a [`UsageRecord`]
/// summed across every round trip this loop made.
///
/// # Errors
///
/// Returns [`AgentError::ToolLoopExceeded`] if the model keeps
/// requesting tools past the configured iteration cap, or whatever
/// [`AgentError`] the dispatcher itself produced.
pub async fn run_tool_loop(
    view: &ControllerView,
    tier: ModelTier,
    mut messages: Vec<ChatMessage>,
    json_mode: bool,
) -> Result<(ChatResponse, crate::core::UsageRecord), AgentError> {
    let mut total_usage: Option<crate::core::UsageRecord> = None;

    for _ in 0..=view.max_tool_iterations() {
        let (response, usage) = view.dispatch(tier, messages.clone(), json_mode).await?;
        total_usage = Some(match total_usage {
            Some(acc) => combine_usage(acc, usage),
            None => usage,
        });

        if response.tool_calls.is_empty() {
            return Ok((response, total_usage.unwrap_or_else(|| unreachable!())));
        }

        messages.push(assistant_tool_calls_message(response.tool_calls.clone()));
        for call in &response.tool_calls {
            let arguments: serde_json::Value =
                serde_json::from_str(&call.arguments).unwrap_or(serde_json::Value::Null);
            let output = match view.call_tool(&call.name, arguments).await {
                Ok(value) => value.to_string(),
                Err(e) => serde_json::json!({ "error": e.to_string() }).to_string(),
            };
            messages.push(tool_message(&call.id, &output));
        }
    }

    Err(AgentError::ToolLoopExceeded {
        max_iterations: view.max_tool_iterations(),
    })
}

fn combine_usage(a: crate::core::UsageRecord, b: crate::core::UsageRecord) -> crate::core::UsageRecord {
    crate::core::UsageRecord {
        provider: b.provider,
        model_name: b.model_name,
        duration_sec: a.duration_sec + b.duration_sec,
        prompt_tokens: add_optional(a.prompt_tokens, b.prompt_tokens),
        completion_tokens: add_optional(a.completion_tokens, b.completion_tokens),
        native_tokens: add_optional(a.native_tokens, b.native_tokens),
        cost: match (a.cost, b.cost) {
            (Some(x), Some(y)) => Some(x + y),
            (Some(x), None) => Some(x),
            (None, Some(y)) => Some(y),
            (None, None) => None,
        },
    }
}

const fn add_optional(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x + y),
        (Some(x), None) => Some(x),
        (None, Some(y)) => Some(y),
        (None, None) => None,
    }
}

/// Parses a model's JSON-mode response body into `T`, wrapping failures
/// in [`AgentError::ResponseParse`] with the raw content attached for
/// diagnostics (shared by every agent unit's output parsing).
///
/// # Errors
///
/// Returns [`AgentError::ResponseParse`] if `content` is not valid JSON
/// for `T`.
pub fn parse_json_response<T: DeserializeOwned>(content: &str) -> Result<T, AgentError> {
    serde_json::from_str(content).map_err(|e| AgentError::ResponseParse {
        message: e.to_string(),
        content: content.to_string(),
    })
}
