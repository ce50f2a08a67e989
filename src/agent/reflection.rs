//! Reflection agent unit (component G): reviews accumulated notes
//! against the current outline, judges which sections need more
//! research, and proposes outline revisions when the evidence demands
//! it.

use serde::Deserialize;

use crate::core::{Section, SectionId, UsageRecord};
use crate::error::AgentError;

use super::dispatcher::ModelTier;
use super::message::{system_message, user_message};
use super::traits::{Agent, ControllerView, parse_json_response};

/// What the Reflection agent reviews.
#[derive(Debug, Clone)]
pub struct ReflectionInput {
    /// The mission's overall goal.
    pub mission_goal: String,
    /// The report outline as it currently stands.
    pub outline: Vec<Section>,
    /// One-line summaries of notes gathered so far, per section.
    pub notes_summary: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ReflectionWire {
    thought: String,
    #[serde(default)]
    outline_revision: Option<Vec<Section>>,
    #[serde(default)]
    sections_needing_more_research: Vec<SectionId>,
    #[serde(default)]
    sections_sufficiently_covered: Vec<SectionId>,
}

/// Output of a Reflection call.
#[derive(Debug, Clone)]
pub struct ReflectionOutput {
    /// Reasoning recorded for the mission's thought pad.
    pub thought: String,
    /// A full replacement outline, when the evidence demands a revision.
    pub outline_revision: Option<Vec<Section>>,
    /// Sections judged to need another research cycle.
    pub sections_needing_more_research: Vec<SectionId>,
    /// Sections judged sufficiently covered.
    pub sections_sufficiently_covered: Vec<SectionId>,
}

/// The Reflection agent unit.
pub struct Reflection {
    system_prompt: String,
}

impl Reflection {
    /// Creates a Reflection unit using `system_prompt` (from
    /// [`super::prompt::PromptSet::reflection`] or an override).
    #[must_use]
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }
}

#[async_trait::async_trait]
impl Agent for Reflection {
    type Input = ReflectionInput;
    type Output = ReflectionOutput;

    fn name(&self) -> &'static str {
        "reflection"
    }

    async fn run(
        &self,
        view: &ControllerView,
        input: Self::Input,
    ) -> Result<(Self::Output, UsageRecord), AgentError> {
        let outline_json = serde_json::to_string_pretty(&input.outline).unwrap_or_default();
        let user_content = format!(
            "Mission goal: {}\n\nCurrent outline:\n{outline_json}\n\nNotes gathered so far:\n{}",
            input.mission_goal,
            if input.notes_summary.is_empty() {
                "(none yet)".to_string()
            } else {
                input.notes_summary.join("\n")
            }
        );

        let messages = vec![system_message(&self.system_prompt), user_message(&user_content)];
        let (response, usage) = view.dispatch(ModelTier::Intelligent, messages, true).await?;
        let wire: ReflectionWire = parse_json_response(&response.content)?;

        Ok((
            ReflectionOutput {
                thought: wire.thought,
                outline_revision: wire.outline_revision,
                sections_needing_more_research: wire.sections_needing_more_research,
                sections_sufficiently_covered: wire.sections_sufficiently_covered,
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
    async fn test_run_leaves_outline_unchanged_when_not_revised() {
        let content = serde_json::json!({
            "thought": "coverage looks solid",
            "outline_revision": null,
            "sections_needing_more_research": [],
            "sections_sufficiently_covered": ["intro"]
        })
        .to_string();
        let view = test_view(content);
        let reflection = Reflection::new("you are reflection");
        let (output, _usage) = reflection
            .run(
                &view,
                ReflectionInput {
                    mission_goal: "survey coffee prices".to_string(),
                    outline: Vec::new(),
                    notes_summary: vec!["found one price movement".to_string()],
                },
            )
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));
        assert!(output.outline_revision.is_none());
        assert_eq!(output.sections_sufficiently_covered.len(), 1);
    }
}
