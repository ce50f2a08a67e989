//! Database schema definitions.
//!
//! Contains SQL schema and migration logic for the Mission Context Store's
//! `SQLite` database. Two logically distinct sets of tables live side by
//! side here:
//!
//! - `missions`, `execution_log`, `notes`: the Mission Context Store (§4.1,
//!   §4.6 of the design) — durable, per-mission state this engine owns.
//! - `documents`, `chunks`, `chunk_embeddings`, `chunks_fts`: the ingested
//!   document corpus the Retrieval Engine reads. Ingestion itself is out of
//!   scope for this engine (§1); these tables model the "already-populated
//!   hybrid index" the core only consumes.

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// SQL schema for initial database setup.
pub const SCHEMA_SQL: &str = r"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_info (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- ==================== Mission Context Store ====================

-- One row per mission, keyed by the opaque mission id (§6: 'each mission
-- is a single row keyed by mission_id'). Plan/final_report are nullable
-- JSON/text until planning/writing complete. Pads are stored inline since
-- they are small, mission-scoped scratch state.
CREATE TABLE IF NOT EXISTS missions (
    mission_id TEXT PRIMARY KEY,
    user_request TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    status TEXT NOT NULL,
    error_info TEXT,
    metadata TEXT NOT NULL,       -- JSON MissionMetadata
    plan TEXT,                    -- JSON Plan, NULL until planned
    final_report TEXT,            -- NULL until writing completes
    goal_pad TEXT NOT NULL DEFAULT '',
    thought_pad TEXT NOT NULL DEFAULT '',
    agent_scratchpad TEXT NOT NULL DEFAULT '',
    total_cost REAL NOT NULL DEFAULT 0.0,
    total_prompt_tokens INTEGER NOT NULL DEFAULT 0,
    total_completion_tokens INTEGER NOT NULL DEFAULT 0,
    total_native_tokens INTEGER NOT NULL DEFAULT 0,
    total_web_search_calls INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_missions_status ON missions(status);

-- Execution log: append-only, unique per (mission_id, log_id) (invariant
-- P3). `round` is a Mission Controller bookkeeping column (not part of the
-- public ExecutionLogEntry shape) used by resume_from_round truncation
-- (P6); NULL for entries logged outside structured research rounds.
CREATE TABLE IF NOT EXISTS execution_log (
    mission_id TEXT NOT NULL,
    log_id INTEGER NOT NULL,
    round INTEGER,
    data TEXT NOT NULL,            -- JSON ExecutionLogEntry
    PRIMARY KEY (mission_id, log_id),
    FOREIGN KEY (mission_id) REFERENCES missions(mission_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_execution_log_round ON execution_log(mission_id, round);

-- Notes: one row per evidence atom, unique per (mission_id, note_id).
-- `round` mirrors execution_log's bookkeeping column for resume truncation.
CREATE TABLE IF NOT EXISTS notes (
    mission_id TEXT NOT NULL,
    note_id INTEGER NOT NULL,
    round INTEGER,
    data TEXT NOT NULL,            -- JSON Note
    PRIMARY KEY (mission_id, note_id),
    FOREIGN KEY (mission_id) REFERENCES missions(mission_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_notes_round ON notes(mission_id, round);

-- ==================== Document corpus / chunk index ====================

-- Source documents. Populated by the (out of scope) ingestion pipeline.
CREATE TABLE IF NOT EXISTS documents (
    doc_id TEXT PRIMARY KEY,
    title TEXT,
    authors TEXT,                  -- JSON array, NULL if unknown
    original_filename TEXT,
    document_group_id TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_group ON documents(document_group_id);

-- Passages of text retrieved by the hybrid search fabric.
CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chunk_id TEXT UNIQUE NOT NULL,
    doc_id TEXT NOT NULL,
    text TEXT NOT NULL,
    page INTEGER,
    chunk_index INTEGER,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (doc_id) REFERENCES documents(doc_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_chunks_doc ON chunks(doc_id);

-- Dense vector embeddings, one per chunk.
CREATE TABLE IF NOT EXISTS chunk_embeddings (
    chunk_id INTEGER PRIMARY KEY,
    embedding BLOB NOT NULL,       -- f32 array serialized as little-endian bytes
    dimensions INTEGER NOT NULL,
    model_name TEXT,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (chunk_id) REFERENCES chunks(id) ON DELETE CASCADE
);

-- FTS5 virtual table for BM25 sparse search.
CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
    text,
    content='chunks',
    content_rowid='id',
    tokenize='porter unicode61'
);

CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
    INSERT INTO chunks_fts(rowid, text) VALUES (new.id, new.text);
END;

CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, text) VALUES('delete', old.id, old.text);
END;

CREATE TRIGGER IF NOT EXISTS chunks_au AFTER UPDATE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, text) VALUES('delete', old.id, old.text);
    INSERT INTO chunks_fts(chunks_fts, rowid, text) VALUES (new.id, new.text);
END;
";

/// SQL to check if schema is initialized.
pub const CHECK_SCHEMA_SQL: &str = r"
SELECT COUNT(*) FROM sqlite_master
WHERE type='table' AND name='schema_info';
";

/// SQL to get schema version.
pub const GET_VERSION_SQL: &str = r"
SELECT value FROM schema_info WHERE key = 'version';
";

/// SQL to set schema version.
pub const SET_VERSION_SQL: &str = r"
INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?);
";

/// Migrations from older schema versions.
pub struct Migration {
    /// Version this migration upgrades from.
    pub from_version: u32,
    /// Version this migration upgrades to.
    pub to_version: u32,
    /// SQL statements to execute.
    pub sql: &'static str,
}

/// Available migrations. Fresh installs always run `SCHEMA_SQL` directly;
/// this list only matters for databases created by a pre-mission schema
/// version.
pub const MIGRATIONS: &[Migration] = &[];

/// Gets migrations needed to upgrade from a version.
#[must_use]
pub fn get_migrations_from(current_version: u32) -> Vec<&'static Migration> {
    MIGRATIONS
        .iter()
        .filter(|m| m.from_version >= current_version && m.to_version <= CURRENT_SCHEMA_VERSION)
        .collect()
}
