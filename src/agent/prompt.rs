//! System prompts for the six Agent Units (component G), with the same
//! override-directory resolution pattern as the rest of the dispatch
//! configuration: an explicit directory, then [`PROMPT_DIR_ENV`], then a
//! per-user config default, falling back to the prompts baked into this
//! binary for anything missing.

use std::path::{Path, PathBuf};

use crate::error::{IoError, Result};

/// Environment variable pointing at a directory of prompt overrides.
pub const PROMPT_DIR_ENV: &str = "MISSION_PROMPT_DIR";

const PLANNER_FILE: &str = "planner.md";
const RESEARCHER_FILE: &str = "researcher.md";
const REFLECTION_FILE: &str = "reflection.md";
const WRITER_FILE: &str = "writer.md";
const NOTE_ASSIGNER_FILE: &str = "note_assigner.md";
const MESSENGER_FILE: &str = "messenger.md";

const PLANNER_SYSTEM_PROMPT: &str = r#"You are the Planner agent for an autonomous research mission.

Given the mission's restated goal and the user's original request, produce
a structured report outline and an initial queue of plan steps. Respond
with a single JSON object and nothing else, shaped as:

{
  "mission_goal": "one-sentence restatement of what the report must achieve",
  "report_outline": [
    {
      "section_id": "short-kebab-case-id",
      "title": "Section Title",
      "description": "what this section must cover",
      "research_strategy": "how to research it: queries to try, sources to favor",
      "subsections": []
    }
  ],
  "steps": [
    {
      "step_id": 1,
      "description": "research the introduction section",
      "action_type": "research",
      "target_section_id": "short-kebab-case-id"
    }
  ]
}

Rules:
- Every `section_id` must be unique across the whole outline, including
  nested subsections.
- Every `target_section_id` in `steps` must name a `section_id` that
  exists somewhere in `report_outline`.
- `action_type` is one of `research`, `reflect`, `replan`, `write`.
- Prefer 3 to 8 top-level sections for a typical report; use
  `subsections` sparingly, only where a section genuinely needs
  structure.
- If you cannot produce a meaningful outline from the request, still
  return valid JSON with your best single-section attempt rather than
  an empty outline."#;

const RESEARCHER_SYSTEM_PROMPT: &str = r#"You are the Researcher agent for an autonomous research mission.

You are given one report section to investigate, the mission goal, and
the tools available to you (document search, web search, web fetch, file
reader, calculator). Call tools as needed to gather evidence, then
respond with a single JSON object summarizing what you found:

{
  "notes": [
    {
      "content": "a self-contained piece of evidence, in your own words or a direct quote",
      "source_type": "document" | "document_window" | "web" | "internal",
      "source_id": "chunk id, URL, or null",
      "source_metadata": {}
    }
  ],
  "summary": "one or two sentences on what this research cycle established"
}

Rules:
- Every note must be traceable: set `source_id` and enough of
  `source_metadata` (title, url, page) that a reader could find the
  original passage.
- Do not fabricate sources. If a tool call fails or returns nothing
  useful, say so in `summary` rather than inventing a note.
- Keep each note focused on a single claim or fact; split compound
  findings into separate notes."#;

const REFLECTION_SYSTEM_PROMPT: &str = r#"You are the Reflection agent for an autonomous research mission.

Review the notes accumulated so far against the current report outline
and the mission goal. Decide whether the outline needs revision and
whether research on any section should continue. Respond with a single
JSON object:

{
  "thought": "a short paragraph of reasoning for the thought pad",
  "outline_revision": null,
  "sections_needing_more_research": ["section-id"],
  "sections_sufficiently_covered": ["section-id"]
}

If the outline genuinely needs to change (a section is redundant, a gap
was found, scope should narrow or widen), set `outline_revision` to a
complete replacement `report_outline` array in the same shape the
Planner produces; otherwise leave it `null`. Be conservative about
revising the outline — only do so when the evidence gathered so far
clearly demands it."#;

const WRITER_SYSTEM_PROMPT: &str = r#"You are the Writer agent for an autonomous research mission.

Given one report section, its description, and the notes assigned to
it, write the section's prose in Markdown. Cite evidence inline using
the note's source (e.g. a URL in parentheses, or `[doc: title]` for
document sources). Do not include a top-level heading for the whole
report — only this section's heading and body.

If prior content for this section already exists (a previous writing
pass), revise and extend it rather than starting over; preserve any
parts that are still accurate and well-supported.

Respond with the Markdown section content only — no surrounding JSON,
no commentary about your own process."#;

const NOTE_ASSIGNER_SYSTEM_PROMPT: &str = r#"You are the Note-Assigner agent for an autonomous research mission.

Given a batch of unassigned notes and the report outline's section ids,
decide which section(s) each note is relevant to, and whether it is
relevant to the mission at all. Respond with a single JSON object:

{
  "assignments": [
    { "note_id": 1, "potential_sections": ["section-id"], "is_relevant": true }
  ]
}

Rules:
- A note may be assigned to more than one section if it genuinely
  supports several, but prefer the single best-fitting section when in
  doubt.
- Set `is_relevant` to `false` only when the note has no bearing on the
  mission goal at all; near-miss notes should still get `is_relevant:
  true` with whatever `potential_sections` fits best, even a loose fit.
- Every note_id you were given must appear exactly once in
  `assignments`."#;

const MESSENGER_SYSTEM_PROMPT: &str = r#"You are the Messenger agent for an autonomous research mission.

Your job is user-facing communication, not research. Depending on what
you are asked for, you either:

1. Generate clarifying questions for a new mission from its user
   request, when none exist yet; or
2. Summarize the mission's current status in plain language for a
   human watching its progress.

Respond with a single JSON object:

{
  "final_questions": "a short paragraph of clarifying questions, or a restatement if none are needed",
  "status_summary": "a one or two sentence human-readable status update, or null if not requested"
}

If the user's request is already unambiguous and well-scoped, set
`final_questions` to a brief restatement of the mission's scope rather
than inventing questions that do not need answering."#;

/// The full set of system prompts dispatched to LLM calls, one per
/// agent unit, with override support per-file.
#[derive(Debug, Clone)]
pub struct PromptSet {
    /// Planner system prompt.
    pub planner: String,
    /// Researcher system prompt.
    pub researcher: String,
    /// Reflection system prompt.
    pub reflection: String,
    /// Writer system prompt.
    pub writer: String,
    /// Note-Assigner system prompt.
    pub note_assigner: String,
    /// Messenger system prompt.
    pub messenger: String,
}

impl PromptSet {
    /// Returns the built-in prompts, with no overrides applied.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            planner: PLANNER_SYSTEM_PROMPT.to_string(),
            researcher: RESEARCHER_SYSTEM_PROMPT.to_string(),
            reflection: REFLECTION_SYSTEM_PROMPT.to_string(),
            writer: WRITER_SYSTEM_PROMPT.to_string(),
            note_assigner: NOTE_ASSIGNER_SYSTEM_PROMPT.to_string(),
            messenger: MESSENGER_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Loads the prompt set, preferring `explicit_dir`, then
    /// [`PROMPT_DIR_ENV`], then [`PromptSet::default_dir`], falling back
    /// to [`PromptSet::defaults`] for any file that is missing or
    /// unreadable.
    #[must_use]
    pub fn load(explicit_dir: Option<&Path>) -> Self {
        let dir = explicit_dir
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(PROMPT_DIR_ENV).ok().map(PathBuf::from))
            .or_else(Self::default_dir);

        let mut set = Self::defaults();
        let Some(dir) = dir else {
            return set;
        };

        overlay(&dir.join(PLANNER_FILE), &mut set.planner);
        overlay(&dir.join(RESEARCHER_FILE), &mut set.researcher);
        overlay(&dir.join(REFLECTION_FILE), &mut set.reflection);
        overlay(&dir.join(WRITER_FILE), &mut set.writer);
        overlay(&dir.join(NOTE_ASSIGNER_FILE), &mut set.note_assigner);
        overlay(&dir.join(MESSENGER_FILE), &mut set.messenger);
        set
    }

    /// Writes the built-in prompts to `dir` as individual Markdown
    /// files, so an operator can copy and edit them as overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` cannot be created or a file cannot be
    /// written.
    pub fn write_defaults(dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|e| IoError::DirectoryFailed {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let defaults = Self::defaults();
        for (file, content) in [
            (PLANNER_FILE, &defaults.planner),
            (RESEARCHER_FILE, &defaults.researcher),
            (REFLECTION_FILE, &defaults.reflection),
            (WRITER_FILE, &defaults.writer),
            (NOTE_ASSIGNER_FILE, &defaults.note_assigner),
            (MESSENGER_FILE, &defaults.messenger),
        ] {
            let path = dir.join(file);
            std::fs::write(&path, content).map_err(|e| IoError::WriteFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// The per-user default prompt override directory
    /// (`~/.config/mission-rs/prompts/`), when a config directory can be
    /// resolved for the current platform.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("mission-rs").join("prompts"))
    }
}

fn overlay(path: &Path, slot: &mut String) {
    if let Ok(content) = std::fs::read_to_string(path) {
        *slot = content;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_nonempty() {
        let set = PromptSet::defaults();
        assert!(set.planner.contains("Planner"));
        assert!(set.researcher.contains("Researcher"));
        assert!(set.reflection.contains("Reflection"));
        assert!(set.writer.contains("Writer"));
        assert!(set.note_assigner.contains("Note-Assigner"));
        assert!(set.messenger.contains("Messenger"));
    }

    #[test]
    fn test_load_with_no_dir_returns_defaults() {
        let set = PromptSet::load(None);
        assert_eq!(set.planner, PLANNER_SYSTEM_PROMPT);
    }

    #[test]
    fn test_write_defaults_then_load_overlays() {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        PromptSet::write_defaults(dir.path())
            .unwrap_or_else(|e| panic!("write_defaults failed: {e}"));

        std::fs::write(dir.path().join(PLANNER_FILE), "custom planner prompt")
            .unwrap_or_else(|e| panic!("write failed: {e}"));

        let set = PromptSet::load(Some(dir.path()));
        assert_eq!(set.planner, "custom planner prompt");
        assert!(set.researcher.contains("Researcher"));
    }

    #[test]
    fn test_load_missing_dir_falls_back_to_defaults() {
        let set = PromptSet::load(Some(Path::new("/nonexistent/prompt/dir/for/tests")));
        assert_eq!(set.writer, WRITER_SYSTEM_PROMPT);
    }
}
