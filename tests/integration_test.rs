//! Integration tests for Mission-RS.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use mission_rs::core::{
    ExecutionLogEntry, LogId, Mission, MissionId, Note, NoteId, SectionId, SourceType, UsageRecord,
};
use mission_rs::mission::{ResearchParams, ResearchParamsOverride, SettingsResolver};
use mission_rs::storage::traits::{ChunkRow, DocumentRow};
use mission_rs::storage::{SqliteStorage, Storage};
use mission_rs::tools::{CalculatorTool, SearchProvider, Tool, WebPageFetcherTool, WebSearchTool};
use tempfile::TempDir;

/// Helper to create a test storage instance.
fn create_test_storage() -> (SqliteStorage, TempDir) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");
    let mut storage = SqliteStorage::open(&db_path).expect("failed to create storage");
    storage.init().expect("failed to init storage");
    (storage, temp_dir)
}

mod storage_tests {
    use super::*;

    #[test]
    fn test_storage_init_and_status() {
        let (storage, _temp) = create_test_storage();

        assert!(storage.is_initialized().expect("is_initialized failed"));

        let stats = storage.stats().expect("stats failed");
        assert_eq!(stats.mission_count, 0);
        assert_eq!(stats.document_count, 0);
        assert_eq!(stats.chunk_count, 0);
        assert_eq!(stats.embedded_chunk_count, 0);
    }

    #[test]
    fn test_mission_crud() {
        let (mut storage, _temp) = create_test_storage();

        let mission = Mission::new(MissionId::from("m1"), "survey quantum error correction", 1_700_000_000);
        storage.create_mission(&mission).expect("create_mission failed");

        let loaded = storage.get_mission("m1").expect("get_mission failed");
        assert!(loaded.is_some());
        assert_eq!(loaded.expect("mission should exist").user_request, "survey quantum error correction");

        // Duplicate creation is rejected.
        assert!(storage.create_mission(&mission).is_err());

        // save_mission overwrites.
        let mut updated = mission.clone();
        updated.final_report = Some("done".to_string());
        storage.save_mission(&updated).expect("save_mission failed");
        let loaded = storage.get_mission("m1").expect("get_mission failed").expect("mission should exist");
        assert_eq!(loaded.final_report.as_deref(), Some("done"));

        let missions = storage.list_missions().expect("list_missions failed");
        assert_eq!(missions.len(), 1);

        // Unknown mission returns None, not an error.
        assert!(storage.get_mission("missing").expect("get_mission failed").is_none());
    }

    #[test]
    fn test_pads_roundtrip() {
        let (mut storage, _temp) = create_test_storage();
        let mission = Mission::new(MissionId::from("m1"), "x", 0);
        storage.create_mission(&mission).expect("create_mission failed");

        // No pads saved yet.
        assert!(storage.get_pads("m1").expect("get_pads failed").is_none());

        let mut pads = mission_rs::core::Pads::default();
        pads.goal_pad = "restate the goal".to_string();
        pads.push_thought("round 1 looks promising");
        storage.save_pads("m1", &pads).expect("save_pads failed");

        let loaded = storage.get_pads("m1").expect("get_pads failed").expect("pads should exist");
        assert_eq!(loaded.goal_pad, "restate the goal");
        assert_eq!(loaded.thought_pad, "round 1 looks promising");
    }

    #[test]
    fn test_usage_accumulation() {
        let (mut storage, _temp) = create_test_storage();
        let mission = Mission::new(MissionId::from("m1"), "x", 0);
        storage.create_mission(&mission).expect("create_mission failed");

        let record = UsageRecord {
            provider: "openai".to_string(),
            model_name: "gpt-4o".to_string(),
            duration_sec: 1.2,
            prompt_tokens: Some(100),
            completion_tokens: Some(50),
            native_tokens: None,
            cost: Some(0.01),
        };
        let totals = storage.accumulate_usage("m1", &record, false).expect("accumulate_usage failed");
        assert_eq!(totals.total_prompt_tokens, 100);
        assert_eq!(totals.total_completion_tokens, 50);
        assert!((totals.total_cost - 0.01).abs() < f64::EPSILON);
        assert_eq!(totals.total_web_search_calls, 0);

        let totals = storage.accumulate_usage("m1", &record, true).expect("accumulate_usage failed");
        assert_eq!(totals.total_prompt_tokens, 200);
        assert_eq!(totals.total_web_search_calls, 1);

        let read_only = storage.get_usage_totals("m1").expect("get_usage_totals failed");
        assert_eq!(read_only.total_prompt_tokens, 200);
    }

    #[test]
    fn test_execution_log_append_and_duplicate_rejected() {
        let (mut storage, _temp) = create_test_storage();
        let mission = Mission::new(MissionId::from("m1"), "x", 0);
        storage.create_mission(&mission).expect("create_mission failed");

        let entry = ExecutionLogEntry::success(LogId(1), 0, "researcher", "search", "q", "a");
        storage.append_log_entry("m1", &entry, Some(1)).expect("append_log_entry failed");

        // Same log_id within the same mission is rejected (invariant P3).
        let result = storage.append_log_entry("m1", &entry, Some(1));
        assert!(result.is_err());

        let entries = storage.list_log_entries("m1", 0, 100).expect("list_log_entries failed");
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_notes_crud_and_ordering() {
        let (mut storage, _temp) = create_test_storage();
        let mission = Mission::new(MissionId::from("m1"), "x", 0);
        storage.create_mission(&mission).expect("create_mission failed");

        let note1 = Note::new(NoteId(1), "first piece of evidence", SourceType::Web, 100);
        let note2 = Note::new(NoteId(2), "second piece of evidence", SourceType::Document, 200);
        storage.add_note("m1", &note1, Some(1)).expect("add_note failed");
        storage.add_note("m1", &note2, Some(1)).expect("add_note failed");

        let notes = storage.list_notes("m1").expect("list_notes failed");
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].note_id, NoteId(1));
        assert_eq!(notes[1].note_id, NoteId(2));

        let mut assigned = note1.clone();
        assigned.potential_sections.push(SectionId::from("overview"));
        assigned.is_relevant = Some(true);
        storage.update_note_assignment("m1", &assigned).expect("update_note_assignment failed");

        let notes = storage.list_notes("m1").expect("list_notes failed");
        let reloaded = notes.iter().find(|n| n.note_id == NoteId(1)).expect("note 1 should exist");
        assert!(reloaded.is_assigned());
        assert_eq!(reloaded.is_relevant, Some(true));
    }

    #[test]
    fn test_truncate_after_round() {
        let (mut storage, _temp) = create_test_storage();
        let mission = Mission::new(MissionId::from("m1"), "x", 0);
        storage.create_mission(&mission).expect("create_mission failed");

        let round1_note = Note::new(NoteId(1), "round 1 evidence", SourceType::Web, 0);
        let round2_note = Note::new(NoteId(2), "round 2 evidence", SourceType::Web, 0);
        storage.add_note("m1", &round1_note, Some(1)).expect("add_note failed");
        storage.add_note("m1", &round2_note, Some(2)).expect("add_note failed");

        let log1 = ExecutionLogEntry::success(LogId(1), 0, "researcher", "round1", "", "");
        let log2 = ExecutionLogEntry::success(LogId(2), 0, "researcher", "round2", "", "");
        storage.append_log_entry("m1", &log1, Some(1)).expect("append_log_entry failed");
        storage.append_log_entry("m1", &log2, Some(2)).expect("append_log_entry failed");

        // Resuming from round 2 discards everything logged for round > 1.
        storage.truncate_after_round("m1", 2).expect("truncate_after_round failed");

        let notes = storage.list_notes("m1").expect("list_notes failed");
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].note_id, NoteId(1));

        let entries = storage.list_log_entries("m1", 0, 100).expect("list_log_entries failed");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].log_id, LogId(1));
    }

    #[test]
    fn test_document_and_chunk_index() {
        let (mut storage, _temp) = create_test_storage();

        storage
            .add_document(&DocumentRow {
                doc_id: "doc1".to_string(),
                title: Some("Coffee Market Report".to_string()),
                authors: None,
                original_filename: Some("report.pdf".to_string()),
                document_group_id: Some("group-a".to_string()),
            })
            .expect("add_document failed");

        let row_id = storage
            .add_chunk(&ChunkRow {
                chunk_id: "chunk1".to_string(),
                doc_id: "doc1".to_string(),
                text: "Arabica prices rose sharply in Q2.".to_string(),
                page: Some(1),
                chunk_index: Some(0),
            })
            .expect("add_chunk failed");
        assert!(row_id > 0);

        let (found_row_id, chunk_row, metadata) = storage
            .get_chunk_by_chunk_id("chunk1")
            .expect("get_chunk_by_chunk_id failed")
            .expect("chunk should exist");
        assert_eq!(found_row_id, row_id);
        assert_eq!(chunk_row.text, "Arabica prices rose sharply in Q2.");
        assert_eq!(metadata.title.as_deref(), Some("Coffee Market Report"));

        let by_row = storage.get_chunk_by_row_id(row_id).expect("get_chunk_by_row_id failed");
        assert!(by_row.is_some());

        let group_docs = storage.doc_ids_for_group("group-a").expect("doc_ids_for_group failed");
        assert_eq!(group_docs, vec!["doc1".to_string()]);

        storage.store_embedding(row_id, &[0.1, 0.2, 0.3]).expect("store_embedding failed");
        let embeddings = storage.get_all_embeddings(None).expect("get_all_embeddings failed");
        assert_eq!(embeddings.len(), 1);
        assert_eq!(embeddings[0].0, row_id);

        let hits = storage.search_fts("arabica prices", 10, None).expect("search_fts failed");
        assert!(!hits.is_empty());

        let stats = storage.stats().expect("stats failed");
        assert_eq!(stats.document_count, 1);
        assert_eq!(stats.chunk_count, 1);
        assert_eq!(stats.embedded_chunk_count, 1);
    }

    #[test]
    fn test_storage_reset() {
        let (mut storage, _temp) = create_test_storage();

        let mission = Mission::new(MissionId::from("m1"), "x", 0);
        storage.create_mission(&mission).expect("create_mission failed");

        let stats = storage.stats().expect("stats failed");
        assert_eq!(stats.mission_count, 1);

        storage.reset().expect("reset failed");

        let stats = storage.stats().expect("stats after reset failed");
        assert_eq!(stats.mission_count, 0);
        assert!(storage.is_initialized().expect("is_initialized failed"));
    }
}

mod settings_tests {
    use super::*;

    #[test]
    fn test_resolve_falls_back_through_the_chain() {
        let default = ResearchParams::default();
        let mission = ResearchParamsOverride::default();
        let user = ResearchParamsOverride::default();

        let resolved = SettingsResolver::resolve(&mission, &user, &default);
        assert_eq!(resolved.structured_research_rounds, default.structured_research_rounds);
    }

    #[test]
    fn test_mission_override_wins_over_user_and_default() {
        let default = ResearchParams::default();
        let user = ResearchParamsOverride {
            structured_research_rounds: Some(5),
            writing_passes: Some(3),
            ..Default::default()
        };
        let mission = ResearchParamsOverride {
            structured_research_rounds: Some(1),
            ..Default::default()
        };

        let resolved = SettingsResolver::resolve(&mission, &user, &default);
        // Mission's explicit setting wins...
        assert_eq!(resolved.structured_research_rounds, 1);
        // ...but fields the mission left unset still fall through to the user layer.
        assert_eq!(resolved.writing_passes, 3);
        // ...and fields neither layer set still fall through to the default.
        assert_eq!(resolved.use_reranker, default.use_reranker);
    }

    proptest::proptest! {
        #[test]
        fn mission_layer_always_wins_when_set(rounds in 1u32..20, user_rounds in 1u32..20) {
            let default = ResearchParams::default();
            let mission = ResearchParamsOverride { structured_research_rounds: Some(rounds), ..Default::default() };
            let user = ResearchParamsOverride { structured_research_rounds: Some(user_rounds), ..Default::default() };
            let resolved = SettingsResolver::resolve(&mission, &user, &default);
            proptest::prop_assert_eq!(resolved.structured_research_rounds, rounds);
        }
    }
}

mod tool_tests {
    use super::*;
    use async_trait::async_trait;
    use mission_rs::tools::web_search::{DateRange, WebSearchHit};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_calculator_tool_evaluates_expression() {
        let tool = CalculatorTool;
        let output = tool
            .execute(serde_json::json!({"expression": "(3 + 4) * 2"}), None)
            .await
            .expect("calculator execute failed");
        assert_eq!(output["result"], serde_json::json!(14.0));
    }

    #[tokio::test]
    async fn test_calculator_tool_reports_errors_in_band() {
        let tool = CalculatorTool;
        let output = tool
            .execute(serde_json::json!({"expression": "1 / 0"}), None)
            .await
            .expect("calculator execute failed");
        assert!(output.get("error").is_some());
    }

    struct FailingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SearchProvider for FailingProvider {
        async fn search(
            &self,
            _query: &str,
            _max_results: usize,
            _date_range: &DateRange,
            _include_domains: Option<&[String]>,
            _exclude_domains: Option<&[String]>,
        ) -> std::result::Result<Vec<WebSearchHit>, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err("upstream search provider unreachable".to_string())
        }
    }

    /// A failing search provider surfaces its error inside the tool's
    /// `Ok` output, never as a propagated `Err` — the Mission Controller
    /// treats tool failures as something the calling agent reasons about,
    /// not something that aborts the mission.
    #[tokio::test]
    async fn test_web_search_failure_is_isolated_from_the_caller() {
        let provider = Arc::new(FailingProvider { calls: AtomicUsize::new(0) });
        let tool = WebSearchTool::new(provider.clone());

        let output = tool
            .execute(serde_json::json!({"query": "coffee futures"}), None)
            .await
            .expect("web_search execute should not return Err");

        assert_eq!(output["error"], serde_json::json!("upstream search provider unreachable"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_web_fetch_cache_round_trip() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/report"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html><head><title>Report</title></head><body>Arabica rose.</body></html>"),
            )
            // Exactly one hit expected: the second fetch must be served from cache.
            .expect(1)
            .mount(&server)
            .await;

        let cache_dir = TempDir::new().expect("failed to create temp dir");
        let tool = WebPageFetcherTool::new(cache_dir.path()).expect("failed to build web fetch tool");
        let url = format!("{}/report", server.uri());

        let first = tool
            .execute(serde_json::json!({"url": url}), None)
            .await
            .expect("first fetch failed");
        assert_eq!(first["cached"], serde_json::json!(false));
        assert!(first["content"].as_str().unwrap_or_default().contains("Arabica rose"));

        let second = tool
            .execute(serde_json::json!({"url": url}), None)
            .await
            .expect("second fetch failed");
        assert_eq!(second["cached"], serde_json::json!(true));

        server.verify().await;
    }
}
