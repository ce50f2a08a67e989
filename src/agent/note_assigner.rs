//! Note-Assigner agent unit (component G): batches unassigned notes
//! against the report outline's section ids, deciding which section(s)
//! each note is relevant to.

use serde::Deserialize;

use crate::core::{Note, NoteId, SectionId, UsageRecord};
use crate::error::AgentError;

use super::dispatcher::ModelTier;
use super::message::{system_message, user_message};
use super::traits::{Agent, ControllerView, parse_json_response};

/// One note's assignment decision.
#[derive(Debug, Clone, Deserialize)]
pub struct NoteAssignment {
    /// The note being assigned.
    pub note_id: NoteId,
    /// Section(s) this note is relevant to.
    #[serde(default)]
    pub potential_sections: Vec<SectionId>,
    /// Whether the note bears on the mission goal at all.
    pub is_relevant: bool,
}

#[derive(Debug, Deserialize)]
struct NoteAssignerWire {
    #[serde(default)]
    assignments: Vec<NoteAssignment>,
}

/// What the Note-Assigner agent was asked to classify.
#[derive(Debug, Clone)]
pub struct NoteAssignerInput {
    /// Notes awaiting a section assignment.
    pub notes: Vec<Note>,
    /// The section ids notes may be assigned to.
    pub section_ids: Vec<SectionId>,
}

/// Output of a Note-Assigner call.
#[derive(Debug, Clone)]
pub struct NoteAssignerOutput {
    /// Per-note assignment decisions, one per input note.
    pub assignments: Vec<NoteAssignment>,
}

/// The Note-Assigner agent unit.
pub struct NoteAssigner {
    system_prompt: String,
}

impl NoteAssigner {
    /// Creates a Note-Assigner using `system_prompt` (from
    /// [`super::prompt::PromptSet::note_assigner`] or an override).
    #[must_use]
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }
}

#[async_trait::async_trait]
impl Agent for NoteAssigner {
    type Input = NoteAssignerInput;
    type Output = NoteAssignerOutput;

    fn name(&self) -> &'static str {
        "note_assigner"
    }

    async fn run(
        &self,
        view: &ControllerView,
        input: Self::Input,
    ) -> Result<(Self::Output, UsageRecord), AgentError> {
        let notes_block = input
            .notes
            .iter()
            .map(|n| format!("{{\"note_id\": {}, \"content\": {:?}}}", n.note_id.get(), n.content))
            .collect::<Vec<_>>()
            .join(",\n");
        let section_ids = input
            .section_ids
            .iter()
            .map(SectionId::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        let user_content = format!(
            "Section ids available: {section_ids}\n\nNotes to assign:\n[{notes_block}]"
        );

        let messages = vec![system_message(&self.system_prompt), user_message(&user_content)];
        let (response, usage) = view.dispatch(ModelTier::Fast, messages, true).await?;
        let wire: NoteAssignerWire = parse_json_response(&response.content)?;

        Ok((
            NoteAssignerOutput {
                assignments: wire.assignments,
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
    use crate::core::{Pads, SourceType};
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
    async fn test_run_parses_assignments() {
        let content = serde_json::json!({
            "assignments": [
                {"note_id": 1, "potential_sections": ["intro"], "is_relevant": true}
            ]
        })
        .to_string();
        let view = test_view(content);
        let assigner = NoteAssigner::new("you are the note assigner");
        let note = Note::new(NoteId(1), "coffee futures rose 4%", SourceType::Web, 0);
        let (output, _usage) = assigner
            .run(
                &view,
                NoteAssignerInput {
                    notes: vec![note],
                    section_ids: vec![SectionId::from("intro")],
                },
            )
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));
        assert_eq!(output.assignments.len(), 1);
        assert!(output.assignments[0].is_relevant);
    }
}
