//! Lock-wrapping adapter so one backing [`Storage`] can be handed out
//! both as the Mission Controller's own mutable handle and as the
//! `Arc<dyn Storage>` the Retrieval Engine and tool suite read through.
//!
//! The `Storage` trait mixes `&mut self` write methods with `&self` read
//! methods, matching the teacher's direct-`rusqlite::Connection` style.
//! [`SharedStorage`] locks a single `Mutex` per call so the same
//! underlying store can be reached from both worlds without duplicating
//! the trait.

use std::sync::{Arc, Mutex};

use crate::core::{ChunkMetadata, ExecutionLogEntry, Mission, Note, Pads, UsageRecord};
use crate::error::Result;

use super::traits::{ChunkRow, DocumentRow, Storage, StorageStats, UsageTotals};

/// A `Storage` implementation over a `Mutex`-guarded backing store,
/// cloneable and safe to hand to multiple owners (the controller itself,
/// and any tool that needs read access).
#[derive(Clone)]
pub struct SharedStorage(Arc<Mutex<Box<dyn Storage>>>);

impl SharedStorage {
    /// Wraps `storage` for shared access.
    #[must_use]
    pub fn new(storage: Box<dyn Storage>) -> Self {
        Self(Arc::new(Mutex::new(storage)))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Box<dyn Storage>> {
        self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Storage for SharedStorage {
    fn init(&mut self) -> Result<()> {
        self.lock().init()
    }

    fn is_initialized(&self) -> Result<bool> {
        self.lock().is_initialized()
    }

    fn reset(&mut self) -> Result<()> {
        self.lock().reset()
    }

    fn create_mission(&mut self, mission: &Mission) -> Result<()> {
        self.lock().create_mission(mission)
    }

    fn save_mission(&mut self, mission: &Mission) -> Result<()> {
        self.lock().save_mission(mission)
    }

    fn get_mission(&self, mission_id: &str) -> Result<Option<Mission>> {
        self.lock().get_mission(mission_id)
    }

    fn list_missions(&self) -> Result<Vec<Mission>> {
        self.lock().list_missions()
    }

    fn get_pads(&self, mission_id: &str) -> Result<Option<Pads>> {
        self.lock().get_pads(mission_id)
    }

    fn save_pads(&mut self, mission_id: &str, pads: &Pads) -> Result<()> {
        self.lock().save_pads(mission_id, pads)
    }

    fn accumulate_usage(
        &mut self,
        mission_id: &str,
        record: &UsageRecord,
        is_web_search_call: bool,
    ) -> Result<UsageTotals> {
        self.lock().accumulate_usage(mission_id, record, is_web_search_call)
    }

    fn get_usage_totals(&self, mission_id: &str) -> Result<UsageTotals> {
        self.lock().get_usage_totals(mission_id)
    }

    fn append_log_entry(&mut self, mission_id: &str, entry: &ExecutionLogEntry, round: Option<u32>) -> Result<()> {
        self.lock().append_log_entry(mission_id, entry, round)
    }

    fn list_log_entries(&self, mission_id: &str, offset: usize, limit: usize) -> Result<Vec<ExecutionLogEntry>> {
        self.lock().list_log_entries(mission_id, offset, limit)
    }

    fn add_note(&mut self, mission_id: &str, note: &Note, round: Option<u32>) -> Result<()> {
        self.lock().add_note(mission_id, note, round)
    }

    fn update_note_assignment(&mut self, mission_id: &str, note: &Note) -> Result<()> {
        self.lock().update_note_assignment(mission_id, note)
    }

    fn list_notes(&self, mission_id: &str) -> Result<Vec<Note>> {
        self.lock().list_notes(mission_id)
    }

    fn truncate_after_round(&mut self, mission_id: &str, round_num: u32) -> Result<()> {
        self.lock().truncate_after_round(mission_id, round_num)
    }

    fn add_document(&mut self, doc: &DocumentRow) -> Result<()> {
        self.lock().add_document(doc)
    }

    fn add_chunk(&mut self, chunk: &ChunkRow) -> Result<i64> {
        self.lock().add_chunk(chunk)
    }

    fn get_chunk_by_chunk_id(&self, chunk_id: &str) -> Result<Option<(i64, ChunkRow, ChunkMetadata)>> {
        self.lock().get_chunk_by_chunk_id(chunk_id)
    }

    fn get_chunk_by_row_id(&self, row_id: i64) -> Result<Option<(ChunkRow, ChunkMetadata)>> {
        self.lock().get_chunk_by_row_id(row_id)
    }

    fn doc_ids_for_group(&self, document_group_id: &str) -> Result<Vec<String>> {
        self.lock().doc_ids_for_group(document_group_id)
    }

    fn store_embedding(&mut self, row_id: i64, embedding: &[f32]) -> Result<()> {
        self.lock().store_embedding(row_id, embedding)
    }

    fn get_all_embeddings(&self, doc_ids: Option<&[String]>) -> Result<Vec<(i64, Vec<f32>)>> {
        self.lock().get_all_embeddings(doc_ids)
    }

    fn search_fts(&self, query: &str, limit: usize, doc_ids: Option<&[String]>) -> Result<Vec<(i64, f64)>> {
        self.lock().search_fts(query, limit, doc_ids)
    }

    fn stats(&self) -> Result<StorageStats> {
        self.lock().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;

    #[test]
    fn test_shared_storage_round_trips_through_lock() {
        let mut backing = SqliteStorage::in_memory().unwrap_or_else(|e| panic!("open failed: {e}"));
        backing.init().unwrap_or_else(|e| panic!("init failed: {e}"));
        let mut shared = SharedStorage::new(Box::new(backing));

        let mission = Mission::new(crate::core::MissionId::from("m1"), "survey x", 0);
        shared.create_mission(&mission).unwrap_or_else(|e| panic!("create failed: {e}"));

        let clone = shared.clone();
        let loaded = clone.get_mission("m1").unwrap_or_else(|e| panic!("get failed: {e}"));
        assert!(loaded.is_some());
    }
}
