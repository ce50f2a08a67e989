//! Storage layer for Mission-RS.
//!
//! Provides persistent storage for mission state using `SQLite`. The
//! storage layer handles missions, execution logs, notes, and the ingested
//! document/chunk index, with proper transaction support.

pub mod schema;
pub mod shared;
pub mod sqlite;
pub mod traits;

pub use schema::{CURRENT_SCHEMA_VERSION, SCHEMA_SQL};
pub use shared::SharedStorage;
pub use sqlite::SqliteStorage;
pub use traits::{ChunkRow, DocumentRow, Storage, StorageStats, UsageTotals};

/// Default database file name.
pub const DEFAULT_DB_NAME: &str = "mission-state.db";

/// Default database path relative to project root.
pub const DEFAULT_DB_PATH: &str = ".mission/mission-state.db";
