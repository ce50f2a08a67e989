//! Writer agent unit (component G): turns one section's assigned notes
//! into Markdown prose. Unlike the other agent units, its response is
//! not JSON — the model's raw content is the section body.

use crate::core::{Note, Section, UsageRecord};
use crate::error::AgentError;

use super::dispatcher::ModelTier;
use super::message::{system_message, user_message};
use super::traits::{Agent, ControllerView};

/// What the Writer agent was asked to draft.
#[derive(Debug, Clone)]
pub struct WriterInput {
    /// The section being written.
    pub section: Section,
    /// Notes assigned to this section.
    pub notes: Vec<Note>,
    /// This section's content from a previous writing pass, if any, to
    /// be revised rather than replaced from scratch.
    pub previous_content: Option<String>,
}

/// Output of a Writer call.
#[derive(Debug, Clone)]
pub struct WriterOutput {
    /// The section's Markdown content.
    pub content: String,
}

/// The Writer agent unit.
pub struct Writer {
    system_prompt: String,
}

impl Writer {
    /// Creates a Writer using `system_prompt` (from
    /// [`super::prompt::PromptSet::writer`] or an override).
    #[must_use]
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }
}

#[async_trait::async_trait]
impl Agent for Writer {
    type Input = WriterInput;
    type Output = WriterOutput;

    fn name(&self) -> &'static str {
        "writer"
    }

    async fn run(
        &self,
        view: &ControllerView,
        input: Self::Input,
    ) -> Result<(Self::Output, UsageRecord), AgentError> {
        let notes_block = if input.notes.is_empty() {
            "(no notes were gathered for this section)".to_string()
        } else {
            input
                .notes
                .iter()
                .map(|n| format!("- {} (source: {:?} {})", n.content, n.source_type, n.source_id.as_deref().unwrap_or("n/a")))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let mut user_content = format!(
            "Section: {}\nDescription: {}\n\nNotes:\n{notes_block}",
            input.section.title, input.section.description
        );
        if let Some(previous) = &input.previous_content {
            user_content.push_str(&format!("\n\nPrevious draft to revise:\n{previous}"));
        }

        let messages = vec![system_message(&self.system_prompt), user_message(&user_content)];
        let (response, usage) = view.dispatch(ModelTier::Mid, messages, false).await?;

        Ok((
            WriterOutput {
                content: response.content.trim().to_string(),
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
    use crate::agent::traits::{AgentContext, ControllerView};
    use crate::core::{NoteId, Pads, SectionId, SourceType};
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
    async fn test_run_trims_raw_markdown_response() {
        let view = test_view("\n## Introduction\n\nCoffee prices rose this quarter.\n");
        let writer = Writer::new("you are the writer");
        let mut note = Note::new(NoteId(1), "coffee futures rose 4%", SourceType::Web, 0);
        note.source_id = Some("https://example.com".to_string());
        let (output, _usage) = writer
            .run(
                &view,
                WriterInput {
                    section: Section {
                        section_id: SectionId::from("intro"),
                        title: "Introduction".to_string(),
                        description: "overview".to_string(),
                        research_strategy: "x".to_string(),
                        subsections: Vec::new(),
                    },
                    notes: vec![note],
                    previous_content: None,
                },
            )
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));
        assert!(output.content.starts_with("## Introduction"));
    }
}
