//! Storage trait definition.
//!
//! Defines the interface for the Mission Context Store's persistence
//! backend, plus the read side of the document corpus / chunk index the
//! Retrieval Engine consumes. Implementations should make the mission row
//! writes atomic per mission; the engine itself serializes writers per
//! mission (§5: "Plan writes to the Context Store are serialized per
//! mission").

use crate::core::{ChunkMetadata, ExecutionLogEntry, Mission, Note};
use crate::error::Result;
use serde::Serialize;

/// Trait for persistent storage backends.
pub trait Storage: Send + Sync {
    /// Initializes storage (creates schema, runs migrations).
    ///
    /// Should be idempotent - safe to call multiple times.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation or migration fails.
    fn init(&mut self) -> Result<()>;

    /// Checks if storage is initialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the check cannot be performed.
    fn is_initialized(&self) -> Result<bool>;

    /// Resets all stored state.
    ///
    /// Deletes all data but preserves the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    fn reset(&mut self) -> Result<()>;

    // ==================== Mission Operations ====================

    /// Inserts a brand-new mission row.
    ///
    /// # Errors
    ///
    /// Returns an error if a mission with this id already exists or the
    /// write fails.
    fn create_mission(&mut self, mission: &Mission) -> Result<()>;

    /// Overwrites a mission's persisted state (status, plan, metadata,
    /// final report, pads, usage totals).
    ///
    /// # Errors
    ///
    /// Returns an error if the mission does not exist or the write fails.
    fn save_mission(&mut self, mission: &Mission) -> Result<()>;

    /// Loads a mission by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or deserialization fails.
    fn get_mission(&self, mission_id: &str) -> Result<Option<Mission>>;

    /// Lists all missions, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_missions(&self) -> Result<Vec<Mission>>;

    /// Reads the pads (goal/thought/scratchpad) for a mission.
    ///
    /// # Errors
    ///
    /// Returns an error if the mission does not exist.
    fn get_pads(&self, mission_id: &str) -> Result<Option<crate::core::Pads>>;

    /// Overwrites the pads for a mission.
    ///
    /// # Errors
    ///
    /// Returns an error if the mission does not exist or the write fails.
    fn save_pads(&mut self, mission_id: &str, pads: &crate::core::Pads) -> Result<()>;

    /// Adds a usage delta to a mission's running totals, returning the new
    /// totals. Backs the Usage Meter (component A).
    ///
    /// # Errors
    ///
    /// Returns an error if the mission does not exist or the write fails.
    fn accumulate_usage(
        &mut self,
        mission_id: &str,
        record: &crate::core::UsageRecord,
        is_web_search_call: bool,
    ) -> Result<UsageTotals>;

    /// Returns a mission's current usage totals without mutating them.
    ///
    /// # Errors
    ///
    /// Returns an error if the mission does not exist.
    fn get_usage_totals(&self, mission_id: &str) -> Result<UsageTotals>;

    // ==================== Execution Log Operations ====================

    /// Appends an execution log entry. `round` is a bookkeeping column (not
    /// part of the public entry shape) used by `truncate_after_round`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::StorageError::DuplicateLogEntry`] if
    /// `entry.log_id` already exists for this mission (invariant P3).
    fn append_log_entry(
        &mut self,
        mission_id: &str,
        entry: &ExecutionLogEntry,
        round: Option<u32>,
    ) -> Result<()>;

    /// Lists a mission's execution log, ordered by `log_id` ascending, with
    /// offset/limit pagination.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_log_entries(
        &self,
        mission_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ExecutionLogEntry>>;

    // ==================== Note Operations ====================

    /// Adds a note. `round` mirrors the execution log's bookkeeping column.
    ///
    /// # Errors
    ///
    /// Returns an error if a note with this id already exists for the
    /// mission or the write fails.
    fn add_note(&mut self, mission_id: &str, note: &Note, round: Option<u32>) -> Result<()>;

    /// Overwrites a note's assignment hints (`potential_sections`,
    /// `is_relevant`). Notes are otherwise immutable (§3).
    ///
    /// # Errors
    ///
    /// Returns an error if the note does not exist or the write fails.
    fn update_note_assignment(&mut self, mission_id: &str, note: &Note) -> Result<()>;

    /// Lists all notes for a mission, ordered by `created_at` then
    /// `note_id` ascending (ordering guarantee in §4.2).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_notes(&self, mission_id: &str) -> Result<Vec<Note>>;

    /// Deletes all notes and execution log entries logged with
    /// `round > round_num - 1` for a mission. Backs `resume_from_round`
    /// (invariant P6).
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion fails.
    fn truncate_after_round(&mut self, mission_id: &str, round_num: u32) -> Result<()>;

    // ==================== Document corpus / chunk index ====================

    /// Registers a source document in the chunk index.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn add_document(&mut self, doc: &DocumentRow) -> Result<()>;

    /// Adds a chunk to the chunk index, returning its assigned internal
    /// row id (used to key `chunk_embeddings` and `chunks_fts`).
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn add_chunk(&mut self, chunk: &ChunkRow) -> Result<i64>;

    /// Resolves a chunk by its public `chunk_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_chunk_by_chunk_id(
        &self,
        chunk_id: &str,
    ) -> Result<Option<(i64, ChunkRow, ChunkMetadata)>>;

    /// Resolves a chunk by its internal row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_chunk_by_row_id(&self, row_id: i64) -> Result<Option<(ChunkRow, ChunkMetadata)>>;

    /// Resolves the set of `doc_id`s belonging to a document group.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn doc_ids_for_group(&self, document_group_id: &str) -> Result<Vec<String>>;

    /// Stores an embedding for a chunk (internal row id).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn store_embedding(&mut self, row_id: i64, embedding: &[f32]) -> Result<()>;

    /// Returns all `(row_id, embedding)` pairs, optionally restricted to a
    /// set of `doc_id`s.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_all_embeddings(&self, doc_ids: Option<&[String]>) -> Result<Vec<(i64, Vec<f32>)>>;

    /// Performs FTS5 BM25 full-text search, optionally restricted to a set
    /// of `doc_id`s. Returns `(row_id, score)` pairs, higher is better.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    fn search_fts(
        &self,
        query: &str,
        limit: usize,
        doc_ids: Option<&[String]>,
    ) -> Result<Vec<(i64, f64)>>;

    /// Gets storage statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if statistics cannot be gathered.
    fn stats(&self) -> Result<StorageStats>;
}

/// A row in the `documents` table, as seen by ingestion or test fixtures.
#[derive(Debug, Clone)]
pub struct DocumentRow {
    /// Document id.
    pub doc_id: String,
    /// Title, if known.
    pub title: Option<String>,
    /// Authors, if known.
    pub authors: Option<Vec<String>>,
    /// Original filename, if known.
    pub original_filename: Option<String>,
    /// Document group this document belongs to, if any.
    pub document_group_id: Option<String>,
}

/// A row in the `chunks` table, as seen by ingestion or test fixtures.
#[derive(Debug, Clone)]
pub struct ChunkRow {
    /// Public chunk id.
    pub chunk_id: String,
    /// Owning document id.
    pub doc_id: String,
    /// Chunk text.
    pub text: String,
    /// Page number, if paginated.
    pub page: Option<u32>,
    /// Index within the document's chunk sequence.
    pub chunk_index: Option<usize>,
}

/// Running usage totals for a mission, backing `stats_update` events.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct UsageTotals {
    /// Total cost across all LLM/tool calls.
    pub total_cost: f64,
    /// Total prompt tokens.
    pub total_prompt_tokens: u64,
    /// Total completion tokens.
    pub total_completion_tokens: u64,
    /// Total provider-native tokens.
    pub total_native_tokens: u64,
    /// Total web search calls made.
    pub total_web_search_calls: u64,
}

/// Storage statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StorageStats {
    /// Number of missions stored.
    pub mission_count: usize,
    /// Number of documents in the chunk index.
    pub document_count: usize,
    /// Number of chunks in the chunk index.
    pub chunk_count: usize,
    /// Number of chunks with a stored embedding.
    pub embedded_chunk_count: usize,
    /// Schema version.
    pub schema_version: u32,
    /// Database file size in bytes (if applicable).
    pub db_size: Option<u64>,
}
