//! `Note` — a single piece of accumulated evidence gathered during research.

use serde::{Deserialize, Serialize};

use super::ids::{NoteId, SectionId};

/// Where a note's content was pulled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// A retrieval chunk from the ingested document corpus.
    Document,
    /// A contiguous window of chunks from the same document.
    DocumentWindow,
    /// A web search/fetch result.
    Web,
    /// Produced internally (e.g. a Reflection agent's synthesis), with
    /// no external source.
    Internal,
}

/// A typed unit of evidence an agent recorded while researching a
/// section. Notes are immutable after creation except for the section
/// assignment hints left by the Note Assigner agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    /// Identifier, unique within the owning mission.
    pub note_id: NoteId,
    /// The evidence text itself.
    pub content: String,
    /// Where this note's content came from.
    pub source_type: SourceType,
    /// Chunk id, URL, or other source-specific identifier, if any.
    pub source_id: Option<String>,
    /// Source-specific metadata (title, author, retrieval score, URL...)
    /// kept as opaque JSON since its shape varies per `source_type`.
    pub source_metadata: serde_json::Value,
    /// Unix-epoch seconds when the note was recorded.
    pub created_at: i64,
    /// Sections this note may be relevant to, as assigned by the Note
    /// Assigner agent. Empty until assignment runs.
    #[serde(default)]
    pub potential_sections: Vec<SectionId>,
    /// Whether a Reflection pass judged this note relevant to the
    /// mission at all. `None` means no judgment has been made yet.
    pub is_relevant: Option<bool>,
}

impl Note {
    /// Creates a new, unassigned note.
    #[must_use]
    pub fn new(
        note_id: NoteId,
        content: impl Into<String>,
        source_type: SourceType,
        now: i64,
    ) -> Self {
        Self {
            note_id,
            content: content.into(),
            source_type,
            source_id: None,
            source_metadata: serde_json::Value::Null,
            created_at: now,
            potential_sections: Vec::new(),
            is_relevant: None,
        }
    }

    /// Returns `true` if the note has been assigned to at least one
    /// section.
    #[must_use]
    pub fn is_assigned(&self) -> bool {
        !self.potential_sections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_note_is_unassigned() {
        let note = Note::new(NoteId(1), "evidence", SourceType::Document, 0);
        assert!(!note.is_assigned());
        assert_eq!(note.is_relevant, None);
    }

    #[test]
    fn test_assignment_marks_assigned() {
        let mut note = Note::new(NoteId(1), "evidence", SourceType::Web, 0);
        note.potential_sections.push(SectionId::from("s1"));
        assert!(note.is_assigned());
    }
}
