//! `SQLite` storage implementation.
//!
//! Provides persistent storage for mission state and the ingested chunk
//! index using `SQLite`, with transaction support for multi-row writes.

// SQLite stores all integers as i64. These casts are intentional and safe
// because we only ever store non-negative values that fit in usize/u32.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

use crate::core::{ChunkMetadata, ExecutionLogEntry, Mission, MissionMetadata, MissionStatus, Note, Pads, UsageRecord};
use crate::error::{Result, StorageError};
use crate::storage::schema::{
    CHECK_SCHEMA_SQL, CURRENT_SCHEMA_VERSION, GET_VERSION_SQL, SCHEMA_SQL, SET_VERSION_SQL,
};
use crate::storage::traits::{ChunkRow, DocumentRow, Storage, StorageStats, UsageTotals};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};

/// `SQLite`-based storage implementation.
///
/// # Examples
///
/// ```no_run
/// use mission_rs::storage::{SqliteStorage, Storage};
///
/// let mut storage = SqliteStorage::open("mission-state.db").unwrap();
/// storage.init().unwrap();
/// ```
pub struct SqliteStorage {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStorage {
    /// Opens or creates a `SQLite` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Database(e.to_string()))?;
        }

        let conn = Connection::open(&path).map_err(StorageError::from)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(StorageError::from)?;
        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(StorageError::from)?;

        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Creates an in-memory `SQLite` database. Useful for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(StorageError::from)?;
        Ok(Self { conn, path: None })
    }

    /// Returns the database path (`None` for in-memory).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn get_schema_version(&self) -> Result<Option<u32>> {
        let version: Option<String> = self
            .conn
            .query_row(GET_VERSION_SQL, [], |row| row.get(0))
            .optional()
            .map_err(StorageError::from)?;
        Ok(version.and_then(|v| v.parse().ok()))
    }

    fn set_schema_version(&self, version: u32) -> Result<()> {
        self.conn
            .execute(SET_VERSION_SQL, params![version.to_string()])
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    fn row_to_mission(row: &rusqlite::Row<'_>) -> rusqlite::Result<Mission> {
        let mission_id: String = row.get("mission_id")?;
        let status_str: String = row.get("status")?;
        let metadata_json: String = row.get("metadata")?;
        let plan_json: Option<String> = row.get("plan")?;

        let status = match status_str.as_str() {
            "pending" => MissionStatus::Pending,
            "planning" => MissionStatus::Planning,
            "running" => MissionStatus::Running,
            "stopped" => MissionStatus::Stopped,
            "paused" => MissionStatus::Paused,
            "completed" => MissionStatus::Completed,
            _ => MissionStatus::Failed,
        };

        let metadata: MissionMetadata = serde_json::from_str(&metadata_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let plan = plan_json
            .map(|j| serde_json::from_str(&j))
            .transpose()
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;

        Ok(Mission {
            mission_id: mission_id.into(),
            user_request: row.get("user_request")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            status,
            error_info: row.get("error_info")?,
            metadata,
            plan,
            final_report: row.get("final_report")?,
        })
    }

    const fn status_str(status: MissionStatus) -> &'static str {
        match status {
            MissionStatus::Pending => "pending",
            MissionStatus::Planning => "planning",
            MissionStatus::Running => "running",
            MissionStatus::Stopped => "stopped",
            MissionStatus::Paused => "paused",
            MissionStatus::Completed => "completed",
            MissionStatus::Failed => "failed",
        }
    }

    fn row_to_usage_totals(row: &rusqlite::Row<'_>) -> rusqlite::Result<UsageTotals> {
        Ok(UsageTotals {
            total_cost: row.get("total_cost")?,
            total_prompt_tokens: row.get::<_, i64>("total_prompt_tokens")? as u64,
            total_completion_tokens: row.get::<_, i64>("total_completion_tokens")? as u64,
            total_native_tokens: row.get::<_, i64>("total_native_tokens")? as u64,
            total_web_search_calls: row.get::<_, i64>("total_web_search_calls")? as u64,
        })
    }

    #[allow(clippy::type_complexity)]
    fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, ChunkRow, ChunkMetadata)> {
        let authors_json: Option<String> = row.get(7)?;
        let authors = authors_json
            .map(|j| serde_json::from_str::<Vec<String>>(&j))
            .transpose()
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;
        let page: Option<i64> = row.get(4)?;
        let chunk_index: Option<i64> = row.get(5)?;

        Ok((
            row.get(0)?,
            ChunkRow {
                chunk_id: row.get(1)?,
                doc_id: row.get(2)?,
                text: row.get(3)?,
                page: page.map(|p| p as u32),
                chunk_index: chunk_index.map(|i| i as usize),
            },
            ChunkMetadata {
                title: row.get(6)?,
                authors,
                original_filename: row.get(8)?,
                page: page.map(|p| p as u32),
                chunk_index: chunk_index.map(|i| i as usize),
            },
        ))
    }
}

impl Storage for SqliteStorage {
    fn init(&mut self) -> Result<()> {
        let is_init: i64 = self
            .conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StorageError::from)?;

        if is_init == 0 {
            self.conn
                .execute_batch(SCHEMA_SQL)
                .map_err(StorageError::from)?;
            self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
        } else if let Some(current) = self.get_schema_version()?
            && current < CURRENT_SCHEMA_VERSION
        {
            for migration in crate::storage::schema::get_migrations_from(current) {
                self.conn
                    .execute_batch(migration.sql)
                    .map_err(|e| StorageError::Migration(e.to_string()))?;
            }
            self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
        }

        Ok(())
    }

    fn is_initialized(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(count > 0)
    }

    fn reset(&mut self) -> Result<()> {
        self.conn
            .execute_batch(
                r"
            DELETE FROM chunk_embeddings;
            DELETE FROM chunks;
            DELETE FROM documents;
            DELETE FROM notes;
            DELETE FROM execution_log;
            DELETE FROM missions;
        ",
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    // ==================== Mission Operations ====================

    fn create_mission(&mut self, mission: &Mission) -> Result<()> {
        let metadata = serde_json::to_string(&mission.metadata).map_err(StorageError::from)?;
        let plan = mission
            .plan
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(StorageError::from)?;

        self.conn
            .execute(
                r"
            INSERT INTO missions (
                mission_id, user_request, created_at, updated_at, status,
                error_info, metadata, plan, final_report
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ",
                params![
                    mission.mission_id.as_str(),
                    mission.user_request,
                    mission.created_at,
                    mission.updated_at,
                    Self::status_str(mission.status),
                    mission.error_info,
                    metadata,
                    plan,
                    mission.final_report,
                ],
            )
            .map_err(StorageError::from)?;

        Ok(())
    }

    fn save_mission(&mut self, mission: &Mission) -> Result<()> {
        let metadata = serde_json::to_string(&mission.metadata).map_err(StorageError::from)?;
        let plan = mission
            .plan
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(StorageError::from)?;

        let changed = self
            .conn
            .execute(
                r"
            UPDATE missions SET
                user_request = ?, updated_at = ?, status = ?, error_info = ?,
                metadata = ?, plan = ?, final_report = ?
            WHERE mission_id = ?
        ",
                params![
                    mission.user_request,
                    mission.updated_at,
                    Self::status_str(mission.status),
                    mission.error_info,
                    metadata,
                    plan,
                    mission.final_report,
                    mission.mission_id.as_str(),
                ],
            )
            .map_err(StorageError::from)?;

        if changed == 0 {
            return Err(StorageError::MissionNotFound {
                mission_id: mission.mission_id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn get_mission(&self, mission_id: &str) -> Result<Option<Mission>> {
        self.conn
            .query_row(
                "SELECT * FROM missions WHERE mission_id = ?",
                params![mission_id],
                Self::row_to_mission,
            )
            .optional()
            .map_err(StorageError::from)
            .map_err(Into::into)
    }

    fn list_missions(&self) -> Result<Vec<Mission>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM missions ORDER BY updated_at DESC")
            .map_err(StorageError::from)?;
        let rows = stmt
            .query_map([], Self::row_to_mission)
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;
        Ok(rows)
    }

    fn get_pads(&self, mission_id: &str) -> Result<Option<Pads>> {
        self.conn
            .query_row(
                "SELECT goal_pad, thought_pad, agent_scratchpad FROM missions WHERE mission_id = ?",
                params![mission_id],
                |row| {
                    Ok(Pads {
                        goal_pad: row.get(0)?,
                        thought_pad: row.get(1)?,
                        agent_scratchpad: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(StorageError::from)
            .map_err(Into::into)
    }

    fn save_pads(&mut self, mission_id: &str, pads: &Pads) -> Result<()> {
        let changed = self
            .conn
            .execute(
                r"UPDATE missions SET goal_pad = ?, thought_pad = ?, agent_scratchpad = ?
                  WHERE mission_id = ?",
                params![
                    pads.goal_pad,
                    pads.thought_pad,
                    pads.agent_scratchpad,
                    mission_id
                ],
            )
            .map_err(StorageError::from)?;
        if changed == 0 {
            return Err(StorageError::MissionNotFound {
                mission_id: mission_id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn accumulate_usage(
        &mut self,
        mission_id: &str,
        record: &UsageRecord,
        is_web_search_call: bool,
    ) -> Result<UsageTotals> {
        let changed = self
            .conn
            .execute(
                r"
            UPDATE missions SET
                total_cost = total_cost + ?,
                total_prompt_tokens = total_prompt_tokens + ?,
                total_completion_tokens = total_completion_tokens + ?,
                total_native_tokens = total_native_tokens + ?,
                total_web_search_calls = total_web_search_calls + ?
            WHERE mission_id = ?
        ",
                params![
                    record.cost.unwrap_or(0.0),
                    record.prompt_tokens.unwrap_or(0) as i64,
                    record.completion_tokens.unwrap_or(0) as i64,
                    record.native_tokens.unwrap_or(0) as i64,
                    i64::from(is_web_search_call),
                    mission_id,
                ],
            )
            .map_err(StorageError::from)?;

        if changed == 0 {
            return Err(StorageError::MissionNotFound {
                mission_id: mission_id.to_string(),
            }
            .into());
        }

        self.get_usage_totals(mission_id)
    }

    fn get_usage_totals(&self, mission_id: &str) -> Result<UsageTotals> {
        let totals = self
            .conn
            .query_row(
                r"SELECT total_cost, total_prompt_tokens, total_completion_tokens,
                         total_native_tokens, total_web_search_calls
                  FROM missions WHERE mission_id = ?",
                params![mission_id],
                Self::row_to_usage_totals,
            )
            .optional()
            .map_err(StorageError::from)?;

        totals.ok_or_else(|| {
            StorageError::MissionNotFound {
                mission_id: mission_id.to_string(),
            }
            .into()
        })
    }

    // ==================== Execution Log Operations ====================

    fn append_log_entry(
        &mut self,
        mission_id: &str,
        entry: &ExecutionLogEntry,
        round: Option<u32>,
    ) -> Result<()> {
        let data = serde_json::to_string(entry).map_err(StorageError::from)?;
        let result = self.conn.execute(
            "INSERT INTO execution_log (mission_id, log_id, round, data) VALUES (?, ?, ?, ?)",
            params![mission_id, entry.log_id.get() as i64, round, data],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::DuplicateLogEntry {
                    mission_id: mission_id.to_string(),
                    log_id: entry.log_id.get(),
                }
                .into())
            }
            Err(e) => Err(StorageError::from(e).into()),
        }
    }

    fn list_log_entries(
        &self,
        mission_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ExecutionLogEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT data FROM execution_log WHERE mission_id = ? ORDER BY log_id ASC LIMIT ? OFFSET ?",
            )
            .map_err(StorageError::from)?;
        let rows = stmt
            .query_map(params![mission_id, limit as i64, offset as i64], |row| {
                row.get::<_, String>(0)
            })
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;

        rows.into_iter()
            .map(|json| serde_json::from_str(&json).map_err(|e| StorageError::from(e).into()))
            .collect()
    }

    // ==================== Note Operations ====================

    fn add_note(&mut self, mission_id: &str, note: &Note, round: Option<u32>) -> Result<()> {
        let data = serde_json::to_string(note).map_err(StorageError::from)?;
        self.conn
            .execute(
                "INSERT INTO notes (mission_id, note_id, round, data) VALUES (?, ?, ?, ?)",
                params![mission_id, note.note_id.get() as i64, round, data],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn update_note_assignment(&mut self, mission_id: &str, note: &Note) -> Result<()> {
        let data = serde_json::to_string(note).map_err(StorageError::from)?;
        let changed = self
            .conn
            .execute(
                "UPDATE notes SET data = ? WHERE mission_id = ? AND note_id = ?",
                params![data, mission_id, note.note_id.get() as i64],
            )
            .map_err(StorageError::from)?;
        if changed == 0 {
            return Err(StorageError::Database(format!(
                "note {} not found for mission {mission_id}",
                note.note_id
            ))
            .into());
        }
        Ok(())
    }

    fn list_notes(&self, mission_id: &str) -> Result<Vec<Note>> {
        let mut stmt = self
            .conn
            .prepare("SELECT data FROM notes WHERE mission_id = ? ORDER BY note_id ASC")
            .map_err(StorageError::from)?;
        let rows = stmt
            .query_map(params![mission_id], |row| row.get::<_, String>(0))
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;

        let mut notes: Vec<Note> = rows
            .into_iter()
            .map(|json| serde_json::from_str(&json).map_err(StorageError::from))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        notes.sort_by_key(|n| (n.created_at, n.note_id.get()));
        Ok(notes)
    }

    fn truncate_after_round(&mut self, mission_id: &str, round_num: u32) -> Result<()> {
        let tx = self.conn.transaction().map_err(StorageError::from)?;
        // Callers must reject round_num == 0 (boundary behavior B3) before
        // this point; round_num - 1 would otherwise underflow.
        let keep_through = i64::from(round_num) - 1;
        tx.execute(
            "DELETE FROM notes WHERE mission_id = ? AND round > ?",
            params![mission_id, keep_through],
        )
        .map_err(StorageError::from)?;
        tx.execute(
            "DELETE FROM execution_log WHERE mission_id = ? AND round > ?",
            params![mission_id, keep_through],
        )
        .map_err(StorageError::from)?;
        tx.commit().map_err(StorageError::from)?;
        Ok(())
    }

    // ==================== Document corpus / chunk index ====================

    fn add_document(&mut self, doc: &DocumentRow) -> Result<()> {
        let authors = doc
            .authors
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(StorageError::from)?;
        self.conn
            .execute(
                r"INSERT OR REPLACE INTO documents
                  (doc_id, title, authors, original_filename, document_group_id, created_at)
                  VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    doc.doc_id,
                    doc.title,
                    authors,
                    doc.original_filename,
                    doc.document_group_id,
                    Self::now(),
                ],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn add_chunk(&mut self, chunk: &ChunkRow) -> Result<i64> {
        self.conn
            .execute(
                r"INSERT INTO chunks (chunk_id, doc_id, text, page, chunk_index, created_at)
                  VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    chunk.chunk_id,
                    chunk.doc_id,
                    chunk.text,
                    chunk.page,
                    chunk.chunk_index.map(|i| i as i64),
                    Self::now(),
                ],
            )
            .map_err(StorageError::from)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_chunk_by_chunk_id(
        &self,
        chunk_id: &str,
    ) -> Result<Option<(i64, ChunkRow, ChunkMetadata)>> {
        self.conn
            .query_row(
                r"SELECT c.id, c.chunk_id, c.doc_id, c.text, c.page, c.chunk_index,
                         d.title, d.authors, d.original_filename
                  FROM chunks c JOIN documents d ON c.doc_id = d.doc_id
                  WHERE c.chunk_id = ?",
                params![chunk_id],
                Self::row_to_chunk,
            )
            .optional()
            .map_err(StorageError::from)
            .map_err(Into::into)
    }

    fn get_chunk_by_row_id(&self, row_id: i64) -> Result<Option<(ChunkRow, ChunkMetadata)>> {
        let result = self
            .conn
            .query_row(
                r"SELECT c.id, c.chunk_id, c.doc_id, c.text, c.page, c.chunk_index,
                         d.title, d.authors, d.original_filename
                  FROM chunks c JOIN documents d ON c.doc_id = d.doc_id
                  WHERE c.id = ?",
                params![row_id],
                Self::row_to_chunk,
            )
            .optional()
            .map_err(StorageError::from)?;
        Ok(result.map(|(_, row, meta)| (row, meta)))
    }

    fn doc_ids_for_group(&self, document_group_id: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT doc_id FROM documents WHERE document_group_id = ?")
            .map_err(StorageError::from)?;
        let rows = stmt
            .query_map(params![document_group_id], |row| row.get::<_, String>(0))
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;
        Ok(rows)
    }

    fn store_embedding(&mut self, row_id: i64, embedding: &[f32]) -> Result<()> {
        let bytes: Vec<u8> = embedding.iter().flat_map(|f| f.to_le_bytes()).collect();
        self.conn
            .execute(
                r"INSERT OR REPLACE INTO chunk_embeddings (chunk_id, embedding, dimensions, model_name, created_at)
                  VALUES (?, ?, ?, NULL, ?)",
                params![row_id, bytes, embedding.len() as i64, Self::now()],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn get_all_embeddings(&self, doc_ids: Option<&[String]>) -> Result<Vec<(i64, Vec<f32>)>> {
        let sql = match doc_ids {
            None => "SELECT e.chunk_id, e.embedding FROM chunk_embeddings e".to_string(),
            Some(ids) => {
                let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
                format!(
                    "SELECT e.chunk_id, e.embedding FROM chunk_embeddings e \
                     JOIN chunks c ON c.id = e.chunk_id WHERE c.doc_id IN ({placeholders})"
                )
            }
        };

        let mut stmt = self.conn.prepare(&sql).map_err(StorageError::from)?;
        let bound_ids: Vec<&dyn rusqlite::ToSql> = doc_ids
            .map(|ids| ids.iter().map(|s| s as &dyn rusqlite::ToSql).collect())
            .unwrap_or_default();

        let rows = stmt
            .query_map(bound_ids.as_slice(), |row| {
                let chunk_id: i64 = row.get(0)?;
                let bytes: Vec<u8> = row.get(1)?;
                let embedding: Vec<f32> = bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                Ok((chunk_id, embedding))
            })
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;
        Ok(rows)
    }

    fn search_fts(
        &self,
        query: &str,
        limit: usize,
        doc_ids: Option<&[String]>,
    ) -> Result<Vec<(i64, f64)>> {
        let fts_query = query
            .split_whitespace()
            .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(" OR ");

        if fts_query.is_empty() {
            return Ok(Vec::new());
        }

        let sql = match doc_ids {
            None => r"
                SELECT rowid, -bm25(chunks_fts) as score
                FROM chunks_fts
                WHERE chunks_fts MATCH ?
                ORDER BY score DESC
                LIMIT ?"
                .to_string(),
            Some(ids) => {
                let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
                format!(
                    r"SELECT f.rowid, -bm25(f) as score
                      FROM chunks_fts f JOIN chunks c ON c.id = f.rowid
                      WHERE f MATCH ? AND c.doc_id IN ({placeholders})
                      ORDER BY score DESC
                      LIMIT ?"
                )
            }
        };

        let mut stmt = self.conn.prepare(&sql).map_err(StorageError::from)?;
        let mut bound: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(fts_query)];
        if let Some(ids) = doc_ids {
            for id in ids {
                bound.push(Box::new(id.clone()));
            }
        }
        bound.push(Box::new(limit as i64));
        let refs: Vec<&dyn rusqlite::ToSql> =
            bound.iter().map(std::convert::AsRef::as_ref).collect();

        let rows = stmt
            .query_map(refs.as_slice(), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
            })
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;
        Ok(rows)
    }

    fn stats(&self) -> Result<StorageStats> {
        let mission_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM missions", [], |row| row.get(0))
            .map_err(StorageError::from)?;
        let document_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .map_err(StorageError::from)?;
        let chunk_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
            .map_err(StorageError::from)?;
        let embedded_chunk_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunk_embeddings", [], |row| {
                row.get(0)
            })
            .map_err(StorageError::from)?;
        let schema_version = self.get_schema_version()?.unwrap_or(0);
        let db_size = self
            .path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len());

        Ok(StorageStats {
            mission_count: mission_count as usize,
            document_count: document_count as usize,
            chunk_count: chunk_count as usize,
            embedded_chunk_count: embedded_chunk_count as usize,
            schema_version,
            db_size,
        })
    }
}

// SAFETY: this type's only interior-mutability surface is `rusqlite::Connection`,
// accessed exclusively through `&mut self` methods on `Storage`, or read-only
// queries under `&self`. The Mission Controller serializes writers per mission
// (§5), so no two threads ever drive the same connection concurrently.
#[allow(unsafe_code)]
unsafe impl Send for SqliteStorage {}
#[allow(unsafe_code)]
unsafe impl Sync for SqliteStorage {}
