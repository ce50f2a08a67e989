//! Output formatting for CLI commands.
//!
//! Supports text, JSON, and NDJSON output formats.

use crate::core::{ExecutionLogEntry, Mission, Note, Pads, Section};
use crate::storage::UsageTotals;
use crate::storage::traits::StorageStats;
use serde::Serialize;
use std::fmt::Write;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
    /// Newline-delimited JSON (NDJSON) for streaming.
    /// Each record is a single JSON object on its own line.
    Ndjson,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "ndjson" | "jsonl" | "stream" => Self::Ndjson,
            _ => Self::Text,
        }
    }

    /// Returns true if this format is a streaming format.
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        matches!(self, Self::Ndjson)
    }
}

/// Formats a status response.
#[must_use]
pub fn format_status(stats: &StorageStats, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_status_text(stats),
        OutputFormat::Json | OutputFormat::Ndjson => format_json(stats),
    }
}

fn format_status_text(stats: &StorageStats) -> String {
    let mut output = String::new();
    output.push_str("Mission-RS Status\n");
    output.push_str("=================\n\n");
    let _ = writeln!(output, "  Missions:      {}", stats.mission_count);
    let _ = writeln!(output, "  Documents:     {}", stats.document_count);
    let _ = writeln!(output, "  Chunks:        {}", stats.chunk_count);
    let _ = writeln!(output, "  Embedded:      {}", stats.embedded_chunk_count);
    let _ = writeln!(output, "  Schema:        v{}", stats.schema_version);
    if let Some(size) = stats.db_size {
        let _ = writeln!(output, "  DB size:       {size} bytes");
    }
    output
}

/// Formats a single mission record.
#[must_use]
pub fn format_mission(mission: &Mission, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_mission_text(mission),
        OutputFormat::Json | OutputFormat::Ndjson => format_json(mission),
    }
}

fn format_mission_text(mission: &Mission) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Mission: {}", mission.mission_id);
    let _ = writeln!(output, "  Status:  {:?}", mission.status);
    let _ = writeln!(output, "  Request: {}", mission.user_request);
    if let Some(error) = &mission.error_info {
        let _ = writeln!(output, "  Error:   {error}");
    }
    output
}

/// Formats a mission's report outline.
#[must_use]
pub fn format_plan(sections: &[Section], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_plan_text(sections, 0),
        OutputFormat::Json | OutputFormat::Ndjson => format_json(&sections),
    }
}

fn format_plan_text(sections: &[Section], depth: usize) -> String {
    let mut output = String::new();
    for section in sections {
        let _ = writeln!(
            output,
            "{}- [{}] {}",
            "  ".repeat(depth),
            section.section_id,
            section.title
        );
        output.push_str(&format_plan_text(&section.subsections, depth + 1));
    }
    output
}

/// Formats a mission's accumulated notes.
#[must_use]
pub fn format_notes(notes: &[Note], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_notes_text(notes),
        OutputFormat::Json | OutputFormat::Ndjson => format_json(&notes),
    }
}

fn format_notes_text(notes: &[Note]) -> String {
    if notes.is_empty() {
        return "No notes found.\n".to_string();
    }
    let mut output = String::new();
    for note in notes {
        let _ = writeln!(
            output,
            "[{}] ({:?}, relevant={:?}) {}",
            note.note_id,
            note.source_type,
            note.is_relevant,
            truncate(&note.content, 80)
        );
    }
    output
}

/// Formats a mission's execution log.
#[must_use]
pub fn format_logs(entries: &[ExecutionLogEntry], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_logs_text(entries),
        OutputFormat::Json | OutputFormat::Ndjson => format_json(&entries),
    }
}

fn format_logs_text(entries: &[ExecutionLogEntry]) -> String {
    if entries.is_empty() {
        return "No log entries found.\n".to_string();
    }
    let mut output = String::new();
    for entry in entries {
        let _ = writeln!(
            output,
            "[{}] {:?} {} — {}",
            entry.log_id, entry.status, entry.agent_name, entry.action
        );
    }
    output
}

/// Formats a mission's final report.
#[must_use]
pub fn format_report(report: Option<&str>, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => report.unwrap_or("No report available yet.\n").to_string(),
        OutputFormat::Json | OutputFormat::Ndjson => format_json(&serde_json::json!({ "report": report })),
    }
}

/// Formats a mission's usage totals.
#[must_use]
pub fn format_usage(totals: &UsageTotals, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            let _ = writeln!(output, "  Cost:              ${:.4}", totals.total_cost);
            let _ = writeln!(output, "  Prompt tokens:     {}", totals.total_prompt_tokens);
            let _ = writeln!(output, "  Completion tokens: {}", totals.total_completion_tokens);
            let _ = writeln!(output, "  Native tokens:     {}", totals.total_native_tokens);
            let _ = writeln!(output, "  Web search calls:  {}", totals.total_web_search_calls);
            output
        }
        OutputFormat::Json | OutputFormat::Ndjson => format_json(totals),
    }
}

/// Formats a mission's goal/thought/scratch pads.
#[must_use]
pub fn format_pads(pads: &Pads, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            let _ = writeln!(output, "Goal pad:\n{}\n", pads.goal_pad);
            let _ = writeln!(output, "Thought pad:\n{}\n", pads.thought_pad);
            let _ = writeln!(output, "Scratchpad:\n{}", pads.agent_scratchpad);
            output
        }
        OutputFormat::Json | OutputFormat::Ndjson => format_json(pads),
    }
}

/// A simple success/acknowledgement message, for commands with no
/// richer payload to return.
#[must_use]
pub fn format_message(message: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("{message}\n"),
        OutputFormat::Json | OutputFormat::Ndjson => {
            format_json(&serde_json::json!({ "success": true, "message": message }))
        }
    }
}

/// Formats a value as JSON.
fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Formats an error for output.
///
/// When format is JSON, returns a structured error object.
/// When format is Text, returns the error message string.
#[must_use]
pub fn format_error(error: &crate::Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json | OutputFormat::Ndjson => {
            let (error_type, suggestion) = get_error_details(error);
            let json = serde_json::json!({
                "success": false,
                "error": {
                    "type": error_type,
                    "message": error.to_string(),
                    "suggestion": suggestion
                }
            });
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string())
        }
    }
}

/// Extracts error type and recovery suggestion from an error.
fn get_error_details(error: &crate::Error) -> (&'static str, Option<&'static str>) {
    use crate::error::{AgentError, IoError, MissionError, ProgressBusError, RetrievalError, StorageError, ToolError};

    match error {
        crate::Error::Storage(e) => match e {
            StorageError::NotInitialized => (
                "NotInitialized",
                Some("Run 'mission-rs init' to initialize the database"),
            ),
            StorageError::MissionNotFound { .. } => (
                "MissionNotFound",
                Some("Run 'mission-rs status' to see stored missions"),
            ),
            StorageError::DuplicateLogEntry { .. } => ("DuplicateLogEntry", None),
            StorageError::Database(_) => ("DatabaseError", None),
            StorageError::Migration(_) => ("MigrationError", None),
            StorageError::Transaction(_) => ("TransactionError", None),
            StorageError::Serialization(_) => ("SerializationError", None),
        },
        crate::Error::Io(e) => match e {
            IoError::FileNotFound { .. } => ("FileNotFound", Some("Verify the file path exists")),
            IoError::ReadFailed { .. } => ("ReadError", None),
            IoError::WriteFailed { .. } => ("WriteError", None),
            IoError::MmapFailed { .. } => ("MemoryMapError", None),
            IoError::DirectoryFailed { .. } => ("DirectoryError", None),
            IoError::PathTraversal { .. } => (
                "PathTraversalDenied",
                Some("Path traversal outside allowed directory is not permitted"),
            ),
            IoError::Generic(_) => ("IoError", None),
        },
        crate::Error::Mission(e) => match e {
            MissionError::InvalidTransition { .. } => ("InvalidTransition", None),
            MissionError::NoToolsEnabled => (
                "NoToolsEnabled",
                Some("Pass --use-web or --document-group to enable at least one tool"),
            ),
            MissionError::InvalidResumeRound => (
                "InvalidResumeRound",
                Some("Round numbers are 1-based; use a value >= 1"),
            ),
            MissionError::InvalidPlan { .. } => ("InvalidPlan", None),
            MissionError::PhaseFailed { .. } => ("PhaseFailed", None),
            MissionError::Cancelled { .. } => ("Cancelled", None),
        },
        crate::Error::Agent(e) => match e {
            AgentError::ApiKeyMissing => (
                "ApiKeyMissing",
                Some("Set the provider API key in the environment or config"),
            ),
            AgentError::ResponseParse { .. } => ("ResponseParseError", None),
            AgentError::ToolExecution { .. } => ("ToolExecutionError", None),
            AgentError::ToolLoopExceeded { .. } => ("ToolLoopExceeded", None),
            AgentError::ProviderAuth(_) => ("ProviderAuthError", Some("Check the provider API key")),
            AgentError::ProviderQuota(_) => ("ProviderQuotaExceeded", Some("Retry after the provider's rate limit resets")),
            AgentError::ProviderNetwork(_) => ("ProviderNetworkError", Some("Retry; this is usually transient")),
            AgentError::Timeout { .. } => ("ProviderTimeout", None),
            AgentError::Stream { .. } => ("StreamError", None),
            AgentError::Orchestration(_) => ("OrchestrationError", None),
        },
        crate::Error::Retrieval(e) => match e {
            RetrievalError::Embedding(_) => ("EmbeddingError", None),
            RetrievalError::VectorSearch(_) => ("VectorSearchError", None),
            RetrievalError::SparseSearch(_) => ("SparseSearchError", None),
            RetrievalError::Reranker(_) => ("RerankerError", None),
        },
        crate::Error::Tool(e) => match e {
            ToolError::UnknownTool { .. } => ("UnknownTool", None),
            ToolError::InvalidArguments { .. } => ("InvalidArguments", None),
            ToolError::WebSearch(_) => ("WebSearchError", None),
            ToolError::WebFetch { .. } => ("WebFetchError", None),
        },
        crate::Error::ProgressBus(e) => match e {
            ProgressBusError::NoSubscriber { .. } => ("NoSubscriber", None),
            ProgressBusError::ChannelClosed { .. } => ("ChannelClosed", None),
        },
        crate::Error::InvalidState { .. } => ("InvalidState", None),
        crate::Error::Config { .. } => ("ConfigError", None),
    }
}

/// Truncates a string to max length with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s[..max_len].to_string()
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}
