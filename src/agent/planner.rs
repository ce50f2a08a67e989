//! Planner agent unit (component G): turns a mission's user request into
//! a structured [`Plan`] (report outline plus initial step queue), and
//! later revises that outline when the Mission Controller asks for a
//! full replan pass.

use crate::core::{Plan, Section, UsageRecord};
use crate::error::AgentError;

use super::dispatcher::ModelTier;
use super::message::{system_message, user_message};
use super::traits::{Agent, ControllerView, parse_json_response};

/// What the Planner agent was asked to produce.
#[derive(Debug, Clone)]
pub struct PlannerInput {
    /// The mission's original user request.
    pub user_request: String,
    /// Clarifying questions/scope restatement from the Messenger, if any.
    pub final_questions: Option<String>,
    /// Free-text feedback driving a replan (empty for the initial plan).
    pub feedback: Option<String>,
    /// The outline being revised, when this is a replan rather than an
    /// initial planning call.
    pub prior_outline: Option<Vec<Section>>,
}

/// Output of a Planner call: a fully-formed, structurally valid plan.
#[derive(Debug, Clone)]
pub struct PlannerOutput {
    /// The produced plan.
    pub plan: Plan,
}

/// The Planner agent unit.
pub struct Planner {
    system_prompt: String,
}

impl Planner {
    /// Creates a Planner using `system_prompt` (from
    /// [`super::prompt::PromptSet::planner`] or an override).
    #[must_use]
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }
}

#[async_trait::async_trait]
impl Agent for Planner {
    type Input = PlannerInput;
    type Output = PlannerOutput;

    fn name(&self) -> &'static str {
        "planner"
    }

    async fn run(
        &self,
        view: &ControllerView,
        input: Self::Input,
    ) -> Result<(Self::Output, UsageRecord), AgentError> {
        let mut user_content = format!("User request:\n{}", input.user_request);
        if let Some(questions) = &input.final_questions {
            user_content.push_str(&format!("\n\nClarified scope:\n{questions}"));
        }
        if let Some(outline) = &input.prior_outline {
            let outline_json = serde_json::to_string_pretty(outline).unwrap_or_default();
            user_content.push_str(&format!("\n\nCurrent report outline:\n{outline_json}"));
        }
        if let Some(feedback) = &input.feedback {
            user_content.push_str(&format!("\n\nRevise the outline per this feedback:\n{feedback}"));
        }

        let messages = vec![system_message(&self.system_prompt), user_message(&user_content)];
        let (response, usage) = view.dispatch(ModelTier::Intelligent, messages, true).await?;

        let plan: Plan = parse_json_response(&response.content)?;
        plan.validate().map_err(|reason| AgentError::ResponseParse {
            message: format!("planner produced an invalid plan: {reason}"),
            content: response.content.clone(),
        })?;

        Ok((PlannerOutput { plan }, usage))
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

    struct FixedProvider(String);

    #[async_trait::async_trait]
    impl LlmProvider for FixedProvider {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            Ok(ChatResponse {
                content: self.0.clone(),
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

    fn test_view(content: String) -> ControllerView {
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
    async fn test_run_parses_and_validates_plan() {
        let content = serde_json::json!({
            "mission_goal": "survey coffee prices",
            "report_outline": [
                {"section_id": "intro", "title": "Introduction", "description": "overview", "research_strategy": "background search", "subsections": []}
            ],
            "steps": [
                {"step_id": 1, "description": "research intro", "action_type": "research", "target_section_id": "intro"}
            ]
        })
        .to_string();
        let view = test_view(content);
        let planner = Planner::new("you are the planner");
        let (output, _usage) = planner
            .run(
                &view,
                PlannerInput {
                    user_request: "survey coffee prices".to_string(),
                    final_questions: None,
                    feedback: None,
                    prior_outline: None,
                },
            )
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));
        assert_eq!(output.plan.report_outline.len(), 1);
        assert_eq!(output.plan.steps.len(), 1);
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_plan() {
        let content = serde_json::json!({
            "mission_goal": "survey coffee prices",
            "report_outline": [
                {"section_id": "intro", "title": "Introduction", "description": "overview", "research_strategy": "x", "subsections": []}
            ],
            "steps": [
                {"step_id": 1, "description": "research ghost", "action_type": "research", "target_section_id": "missing-section"}
            ]
        })
        .to_string();
        let view = test_view(content);
        let planner = Planner::new("you are the planner");
        let result = planner
            .run(
                &view,
                PlannerInput {
                    user_request: "survey coffee prices".to_string(),
                    final_questions: None,
                    feedback: None,
                    prior_outline: None,
                },
            )
            .await;
        assert!(result.is_err());
    }
}
