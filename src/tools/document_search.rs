//! Document Search Tool — wraps the Retrieval Engine (§4.3) as an
//! agent-dispatchable capability.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::embedding::Embedder;
use crate::error::{Result, ToolError};
use crate::progress::ProgressHandle;
use crate::retrieval::{ChunkFilter, RetrievalEngine, RetrievalQuery};
use crate::storage::Storage;

use super::Tool;

#[derive(Debug, Deserialize)]
struct DocumentSearchInput {
    query: String,
    #[serde(default = "default_n_results")]
    n_results: usize,
    document_group_id: Option<String>,
    filter_doc_ids: Option<Vec<String>>,
    filter_doc_id: Option<String>,
    #[serde(default)]
    use_reranker: bool,
}

const fn default_n_results() -> usize {
    10
}

/// The Document Search Tool: searches the ingested document corpus via
/// hybrid dense+sparse retrieval.
pub struct DocumentSearchTool {
    storage: Arc<dyn Storage>,
    embedder: Arc<dyn Embedder>,
}

impl DocumentSearchTool {
    /// Creates the tool over a shared storage backend and embedder.
    #[must_use]
    pub const fn new(storage: Arc<dyn Storage>, embedder: Arc<dyn Embedder>) -> Self {
        Self { storage, embedder }
    }
}

#[async_trait]
impl Tool for DocumentSearchTool {
    fn name(&self) -> &str {
        "document_search"
    }

    fn description(&self) -> &str {
        "Searches the ingested document corpus for passages relevant to a query, using hybrid dense+sparse retrieval."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The search query."},
                "n_results": {"type": "integer", "description": "Maximum number of passages to return.", "default": 10},
                "document_group_id": {"type": "string", "description": "Restrict search to this document group."},
                "filter_doc_ids": {"type": "array", "items": {"type": "string"}, "description": "Restrict search to these document ids."},
                "filter_doc_id": {"type": "string", "description": "Restrict search to a single document id."},
                "use_reranker": {"type": "boolean", "description": "Rerank the aggregated result against the original query.", "default": false}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: Value, _progress: Option<&ProgressHandle>) -> Result<Value> {
        let args: DocumentSearchInput = serde_json::from_value(input).map_err(|e| ToolError::InvalidArguments {
            tool: self.name().to_string(),
            reason: e.to_string(),
        })?;

        let filter = if let Some(group_id) = args.document_group_id {
            Some(ChunkFilter::DocumentGroup(group_id))
        } else if let Some(ids) = args.filter_doc_ids {
            Some(ChunkFilter::DocIds(ids))
        } else {
            args.filter_doc_id.map(ChunkFilter::DocId)
        };

        let mut query = RetrievalQuery::new(&args.query, args.n_results).with_reranker(args.use_reranker);
        if let Some(filter) = filter {
            query = query.with_filter(filter);
        }

        let engine = RetrievalEngine::new(self.storage.as_ref(), self.embedder.as_ref());
        let chunks = engine.retrieve(&query).await;

        Ok(serde_json::json!({ "chunks": chunks }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{DEFAULT_DIMENSIONS, FallbackEmbedder};
    use crate::storage::{ChunkRow, DocumentRow, SqliteStorage};

    fn setup() -> (Arc<dyn Storage>, Arc<dyn Embedder>) {
        let mut storage = SqliteStorage::in_memory().unwrap();
        storage.init().unwrap();
        storage
            .add_document(&DocumentRow {
                doc_id: "d1".into(),
                title: None,
                authors: None,
                original_filename: None,
                document_group_id: None,
            })
            .unwrap();
        storage
            .add_chunk(&ChunkRow {
                chunk_id: "c1".into(),
                doc_id: "d1".into(),
                text: "Rust is a systems programming language".into(),
                page: None,
                chunk_index: Some(0),
            })
            .unwrap();
        (Arc::new(storage), Arc::new(FallbackEmbedder::new(DEFAULT_DIMENSIONS)))
    }

    #[tokio::test]
    async fn test_document_search_returns_chunks() {
        let (storage, embedder) = setup();
        let tool = DocumentSearchTool::new(storage, embedder);

        let result = tool
            .execute(serde_json::json!({"query": "Rust programming"}), None)
            .await
            .unwrap();
        assert!(!result["chunks"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_document_search_rejects_missing_query() {
        let (storage, embedder) = setup();
        let tool = DocumentSearchTool::new(storage, embedder);

        let result = tool.execute(serde_json::json!({}), None).await;
        assert!(result.is_err());
    }
}
