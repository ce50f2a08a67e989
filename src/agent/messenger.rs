//! Messenger agent unit (component G): user-facing communication only,
//! never research. Generates clarifying `final_questions` for a new
//! mission, or summarizes current status for a human watching progress.

use serde::Deserialize;

use crate::core::UsageRecord;
use crate::error::AgentError;

use super::dispatcher::ModelTier;
use super::message::{system_message, user_message};
use super::traits::{Agent, ControllerView, parse_json_response};

#[derive(Debug, Deserialize)]
struct MessengerWire {
    final_questions: String,
    status_summary: Option<String>,
}

/// What the Messenger agent was asked to do.
#[derive(Debug, Clone)]
pub enum MessengerInput {
    /// Generate clarifying questions for a new mission from its request.
    GenerateQuestions {
        /// The mission's original user request.
        user_request: String,
    },
    /// Summarize the mission's current status in plain language.
    SummarizeStatus {
        /// The mission's original user request.
        user_request: String,
        /// Current mission status, as a string.
        status: String,
        /// Recent execution log actions, most recent first.
        recent_actions: Vec<String>,
    },
}

/// Output of a Messenger call: either a question set, a status summary,
/// or both (the wire format always carries both fields, `None` when the
/// caller did not ask for that half).
#[derive(Debug, Clone)]
pub struct MessengerOutput {
    /// Clarifying questions / scope restatement, when requested.
    pub final_questions: Option<String>,
    /// Plain-language status update, when requested.
    pub status_summary: Option<String>,
}

/// The Messenger agent unit.
pub struct Messenger {
    system_prompt: String,
}

impl Messenger {
    /// Creates a Messenger using `system_prompt` (from
    /// [`super::prompt::PromptSet::messenger`] or an override).
    #[must_use]
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }
}

#[async_trait::async_trait]
impl Agent for Messenger {
    type Input = MessengerInput;
    type Output = MessengerOutput;

    fn name(&self) -> &'static str {
        "messenger"
    }

    async fn run(
        &self,
        view: &ControllerView,
        input: Self::Input,
    ) -> Result<(Self::Output, UsageRecord), AgentError> {
        let user_content = match &input {
            Self::Input::GenerateQuestions { user_request } => format!(
                "Generate clarifying questions for this new mission.\n\nUser request:\n{user_request}"
            ),
            Self::Input::SummarizeStatus {
                user_request,
                status,
                recent_actions,
            } => format!(
                "Summarize the mission's current status for the user.\n\nUser request:\n{user_request}\n\nCurrent status: {status}\n\nRecent actions:\n{}",
                if recent_actions.is_empty() {
                    "(none yet)".to_string()
                } else {
                    recent_actions.join("\n")
                }
            ),
        };

        let messages = vec![system_message(&self.system_prompt), user_message(&user_content)];
        let (response, usage) = view.dispatch(ModelTier::Fast, messages, true).await?;
        let wire: MessengerWire = parse_json_response(&response.content)?;

        Ok((
            MessengerOutput {
                final_questions: Some(wire.final_questions),
                status_summary: wire.status_summary,
            },
            usage,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::config::DispatcherConfig;
    use crate::agent::dispatcher::ModelDispatcher;
    use crate::agent::message::{ChatRequest, ChatResponse, TokenUsage};
    use crate::agent::provider::LlmProvider;
    use crate::agent::traits::AgentContext;
    use crate::core::Pads;
    use crate::progress::{ProgressBus, ProgressHandle};
    use crate::tools::ToolRegistry;
    use std::pin::Pin;
    use std::sync::Arc;

    struct FixedProvider(&'static str);

    #[async_trait::async_trait]
    impl LlmProvider for FixedProvider {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            Ok(ChatResponse {
                content: self.0.to_string(),
                usage: TokenUsage {
                    prompt_tokens: 1,
                    completion_tokens: 1,
                    total_tokens: 2,
                },
                tool_calls: Vec::new(),
                finish_reason: Some("stop".to_string()),
            })
        }

        async fn chat_stream(
            &self,
            _request: &ChatRequest,
        ) -> Result<Pin<Box<dyn futures_util::Stream<Item = Result<String, AgentError>> + Send>>, AgentError>
        {
            Err(AgentError::Stream {
                message: "not implemented".to_string(),
            })
        }
    }

    fn test_view(content: &'static str) -> ControllerView {
        let provider = Arc::new(FixedProvider(content));
        let config = DispatcherConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|e| panic!("build failed: {e}"));
        let dispatcher = Arc::new(ModelDispatcher::new(provider, config));
        let bus = ProgressBus::new(8);
        let progress = ProgressHandle::new(bus, "m1".to_string());
        ControllerView::new(
            crate::core::MissionId::from("m1"),
            dispatcher,
            Arc::new(ToolRegistry::new()),
            Vec::new(),
            progress,
            AgentContext {
                plan: None,
                pads: Pads::default(),
                notes: Vec::new(),
            },
        )
    }

    #[tokio::test]
    async fn test_generate_questions_parses_wire_format() {
        let view = test_view(r#"{"final_questions": "what timeframe?", "status_summary": null}"#);
        let messenger = Messenger::new("you are the messenger");
        let (output, _usage) = messenger
            .run(
                &view,
                MessengerInput::GenerateQuestions {
                    user_request: "research coffee prices".to_string(),
                },
            )
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));
        assert_eq!(output.final_questions.as_deref(), Some("what timeframe?"));
        assert_eq!(output.status_summary, None);
    }

    #[tokio::test]
    async fn test_summarize_status_carries_summary_through() {
        let view = test_view(r#"{"final_questions": "", "status_summary": "researching section 2"}"#);
        let messenger = Messenger::new("you are the messenger");
        let (output, _usage) = messenger
            .run(
                &view,
                MessengerInput::SummarizeStatus {
                    user_request: "research coffee prices".to_string(),
                    status: "running".to_string(),
                    recent_actions: vec!["researched section 1".to_string()],
                },
            )
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));
        assert_eq!(output.status_summary.as_deref(), Some("researching section 2"));
    }
}
