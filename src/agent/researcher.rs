//! Researcher agent unit (component G): investigates one report section
//! using the tool suite (document search, web search, web fetch, file
//! reader, calculator) and returns draft notes plus a short summary.

use serde::Deserialize;

use crate::core::{Section, SourceType, UsageRecord};
use crate::error::AgentError;

use super::dispatcher::ModelTier;
use super::message::{system_message, user_message};
use super::traits::{Agent, ControllerView, parse_json_response, run_tool_loop};

/// A note as the Researcher reports it, before the Mission Controller
/// assigns it a [`crate::core::NoteId`]/timestamp and persists it.
#[derive(Debug, Clone, Deserialize)]
pub struct DraftNote {
    /// The evidence text itself.
    pub content: String,
    /// Where this note's content came from.
    pub source_type: SourceType,
    /// Chunk id, URL, or other source-specific identifier, if any.
    #[serde(default)]
    pub source_id: Option<String>,
    /// Source-specific metadata (title, author, retrieval score, URL...).
    #[serde(default)]
    pub source_metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ResearcherWire {
    #[serde(default)]
    notes: Vec<DraftNote>,
    summary: String,
}

/// What the Researcher agent was asked to investigate.
#[derive(Debug, Clone)]
pub struct ResearcherInput {
    /// The section being researched.
    pub section: Section,
    /// The mission's overall goal, for context.
    pub mission_goal: String,
    /// One-line summaries of notes gathered on prior research cycles,
    /// so the Researcher does not repeat earlier ground.
    pub prior_notes_summary: Vec<String>,
}

/// Output of a Researcher call.
#[derive(Debug, Clone)]
pub struct ResearcherOutput {
    /// Draft notes gathered this cycle.
    pub notes: Vec<DraftNote>,
    /// One or two sentences on what this cycle established.
    pub summary: String,
}

/// The Researcher agent unit.
pub struct Researcher {
    system_prompt: String,
}

impl Researcher {
    /// Creates a Researcher using `system_prompt` (from
    /// [`super::prompt::PromptSet::researcher`] or an override).
    #[must_use]
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }
}

#[async_trait::async_trait]
impl Agent for Researcher {
    type Input = ResearcherInput;
    type Output = ResearcherOutput;

    fn name(&self) -> &'static str {
        "researcher"
    }

    async fn run(
        &self,
        view: &ControllerView,
        input: Self::Input,
    ) -> Result<(Self::Output, UsageRecord), AgentError> {
        let mut user_content = format!(
            "Mission goal: {}\n\nSection to research: {}\nDescription: {}\nResearch strategy: {}",
            input.mission_goal, input.section.title, input.section.description, input.section.research_strategy,
        );
        if !input.prior_notes_summary.is_empty() {
            user_content.push_str(&format!(
                "\n\nNotes already gathered for this section:\n{}",
                input.prior_notes_summary.join("\n")
            ));
        }

        let messages = vec![system_message(&self.system_prompt), user_message(&user_content)];
        let (response, usage) = run_tool_loop(view, ModelTier::Mid, messages, true).await?;
        let wire: ResearcherWire = parse_json_response(&response.content)?;

        Ok((
            ResearcherOutput {
                notes: wire.notes,
                summary: wire.summary,
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
    use crate::core::{Pads, SectionId};
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

    fn test_section() -> Section {
        Section {
            section_id: SectionId::from("intro"),
            title: "Introduction".to_string(),
            description: "overview of the topic".to_string(),
            research_strategy: "search broadly".to_string(),
            subsections: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_run_parses_notes_when_model_stops_calling_tools() {
        let content = serde_json::json!({
            "notes": [
                {"content": "coffee futures rose 4%", "source_type": "web", "source_id": "https://example.com", "source_metadata": {"title": "market report"}}
            ],
            "summary": "found one relevant price movement"
        })
        .to_string();
        let view = test_view(content);
        let researcher = Researcher::new("you are the researcher");
        let (output, _usage) = researcher
            .run(
                &view,
                ResearcherInput {
                    section: test_section(),
                    mission_goal: "survey coffee prices".to_string(),
                    prior_notes_summary: Vec::new(),
                },
            )
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));
        assert_eq!(output.notes.len(), 1);
        assert_eq!(output.notes[0].source_id.as_deref(), Some("https://example.com"));
    }
}
