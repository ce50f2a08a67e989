//! Error types for the mission orchestration engine.
//!
//! A top-level [`Error`] wraps one sub-enum per domain (storage, I/O,
//! mission lifecycle, agent execution, retrieval, tools, the progress
//! bus) so callers can match narrowly while `?` still composes across
//! module boundaries.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the mission orchestration engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Storage-related errors (mission/context persistence).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O errors (file operations, web cache).
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Mission lifecycle errors.
    #[error("mission error: {0}")]
    Mission(#[from] MissionError),

    /// Agent execution errors.
    #[error("agent error: {0}")]
    Agent(#[from] AgentError),

    /// Retrieval engine errors.
    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// Tool execution errors.
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    /// Progress bus errors.
    #[error("progress bus error: {0}")]
    ProgressBus(#[from] ProgressBusError),

    /// Invalid state errors.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the invalid state.
        message: String,
    },

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

/// Storage-specific errors for mission persistence.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Storage not initialized.
    #[error("storage not initialized; run init first")]
    NotInitialized,

    /// Mission not found in storage.
    #[error("mission not found: {mission_id}")]
    MissionNotFound {
        /// Mission id that was not found.
        mission_id: String,
    },

    /// Execution log entry with a duplicate `log_id` for its mission.
    #[error("duplicate log entry {log_id} for mission {mission_id}")]
    DuplicateLogEntry {
        /// Mission the entry belongs to.
        mission_id: String,
        /// The duplicated log id.
        log_id: u64,
    },

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Transaction error.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// I/O-specific errors for file and cache operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found.
        path: String,
    },

    /// Failed to read file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to write file.
    #[error("failed to write file: {path}: {reason}")]
    WriteFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Directory creation error.
    #[error("failed to create directory: {path}: {reason}")]
    DirectoryFailed {
        /// Path to the directory.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Path traversal security error: the resolved containing directory
    /// of a requested path lies outside the allowed base directory.
    #[error("path traversal denied: {path}")]
    PathTraversal {
        /// Path that was denied.
        path: String,
    },

    /// Unsupported file extension for the File Reader tool.
    #[error("unsupported file extension: {path}")]
    UnsupportedExtension {
        /// Path with the unsupported extension.
        path: String,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

/// Mission lifecycle errors.
#[derive(Error, Debug)]
pub enum MissionError {
    /// Mission is not in a state that permits the requested operation.
    #[error("mission {mission_id} is {status}, cannot {operation}")]
    InvalidTransition {
        /// Mission affected.
        mission_id: String,
        /// Current status.
        status: String,
        /// Operation that was rejected.
        operation: String,
    },

    /// Creating a mission with neither web search nor local retrieval
    /// enabled (boundary behavior B1).
    #[error("mission must enable web search, local retrieval, or both")]
    NoToolsEnabled,

    /// `resume_from_round(0)` was requested (boundary behavior B3).
    #[error("resume_from_round requires round_num >= 1")]
    InvalidResumeRound,

    /// The Planner produced an outline with a duplicate section id, or a
    /// plan step whose `target_section_id` does not resolve (invariant P5).
    #[error("invalid plan: {reason}")]
    InvalidPlan {
        /// Description of the violated invariant.
        reason: String,
    },

    /// A mandatory phase step failed after exhausting retries.
    #[error("phase {phase} failed: {reason}")]
    PhaseFailed {
        /// Phase name (e.g. "outline_generation").
        phase: String,
        /// Failure reason.
        reason: String,
    },

    /// Cooperative cancellation observed at an await boundary.
    #[error("mission {mission_id} was cancelled")]
    Cancelled {
        /// Mission that was cancelled.
        mission_id: String,
    },
}

/// Agent execution errors (LLM calls, tool-calling loop, response parsing).
#[derive(Error, Debug)]
pub enum AgentError {
    /// No API key configured for the selected provider.
    #[error("no API key configured for provider")]
    ApiKeyMissing,

    /// The model response could not be parsed into the expected schema.
    #[error("failed to parse agent response: {message}")]
    ResponseParse {
        /// Description of the parse failure.
        message: String,
        /// Raw response content, for diagnostics.
        content: String,
    },

    /// A requested tool does not exist or its arguments were invalid.
    #[error("tool execution failed ({name}): {message}")]
    ToolExecution {
        /// Tool name.
        name: String,
        /// Failure description.
        message: String,
    },

    /// The agentic tool-calling loop exceeded its iteration budget.
    #[error("tool-calling loop exceeded {max_iterations} iterations")]
    ToolLoopExceeded {
        /// Configured iteration limit.
        max_iterations: usize,
    },

    /// Provider returned an authentication error (expired/invalid key).
    #[error("provider authentication failed: {0}")]
    ProviderAuth(String),

    /// Provider returned a quota/rate-limit error.
    #[error("provider quota exceeded: {0}")]
    ProviderQuota(String),

    /// Transient network error talking to a provider; caller may retry.
    #[error("provider network error: {0}")]
    ProviderNetwork(String),

    /// Provider request exceeded its configured timeout.
    #[error("provider request timed out after {timeout_secs}s")]
    Timeout {
        /// Configured timeout, in seconds.
        timeout_secs: u64,
    },

    /// Streaming response error.
    #[error("stream error: {message}")]
    Stream {
        /// Description of the stream failure.
        message: String,
    },

    /// Orchestration-internal error (e.g. a spawned task panicked).
    #[error("orchestration error: {0}")]
    Orchestration(String),
}

/// Retrieval engine errors.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The embedding backend failed to produce a vector.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The dense vector index failed to answer a query.
    #[error("vector search failed: {0}")]
    VectorSearch(String),

    /// The sparse (lexical) index failed to answer a query.
    #[error("sparse search failed: {0}")]
    SparseSearch(String),

    /// The reranker failed; callers fall back to unreranked order.
    #[error("reranker failed: {0}")]
    Reranker(String),
}

/// Tool execution errors surfaced as structured, user-facing results
/// rather than propagated (§7: tool errors never propagate upward).
#[derive(Error, Debug)]
pub enum ToolError {
    /// The requested tool is not registered.
    #[error("unknown tool: {name}")]
    UnknownTool {
        /// Requested tool name.
        name: String,
    },

    /// Tool arguments failed schema validation.
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments {
        /// Tool name.
        tool: String,
        /// Validation failure description.
        reason: String,
    },

    /// Web search provider returned an auth/quota/network error.
    #[error("web search failed: {0}")]
    WebSearch(String),

    /// Web fetch failed; `suggestion` offers the caller remediation text.
    #[error("web fetch failed ({status}): {message}")]
    WebFetch {
        /// HTTP status code, or 0 if the request never reached the server.
        status: u16,
        /// Failure description.
        message: String,
        /// Suggested remediation shown to the user.
        suggestion: String,
    },
}

/// Progress bus errors.
#[derive(Error, Debug)]
pub enum ProgressBusError {
    /// No subscriber is registered for the given mission.
    #[error("no subscriber registered for mission {mission_id}")]
    NoSubscriber {
        /// Mission id with no subscriber.
        mission_id: String,
    },

    /// The bus channel was closed while a publish was in flight.
    #[error("channel closed for mission {mission_id}")]
    ChannelClosed {
        /// Mission id whose channel closed.
        mission_id: String,
    },
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
