//! Hybrid search with semantic and lexical retrieval.
//!
//! Combines vector similarity search (cosine, brute-force over stored
//! chunk embeddings) with FTS5 BM25 lexical search, fused by Reciprocal
//! Rank Fusion. This module is the single-query primitive the Retrieval
//! Engine (`crate::retrieval`) builds its multi-query aggregation and
//! reranking pipeline on top of.

mod hnsw;
mod rrf;

pub use hnsw::{HnswConfig, HnswIndex, HnswResult};
pub use rrf::{RrfConfig, reciprocal_rank_fusion, weighted_rrf};

use crate::embedding::{Embedder, cosine_similarity};
use crate::error::Result;
use crate::storage::Storage;

/// Default similarity threshold for semantic search.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.3;

/// Default number of results to return.
pub const DEFAULT_TOP_K: usize = 10;

/// A single hybrid-search hit: an internal chunk row id plus its fused
/// score and the component scores that contributed to it.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Internal chunk row id (see `Storage::get_chunk_by_row_id`).
    pub row_id: i64,
    /// Combined score (RRF fusion, or the single component score when
    /// only one retrieval method is enabled). Higher is better.
    pub score: f64,
    /// Dense cosine-similarity score, if semantic search was used.
    pub semantic_score: Option<f32>,
    /// Sparse BM25 score, if lexical search was used.
    pub bm25_score: Option<f64>,
}

/// Configuration for a single hybrid search call.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Maximum number of results to return.
    pub top_k: usize,
    /// Minimum similarity threshold for semantic results.
    pub similarity_threshold: f32,
    /// RRF k parameter (default 60).
    pub rrf_k: u32,
    /// Weight applied to the dense (semantic) ranked list before fusion.
    pub dense_weight: f64,
    /// Weight applied to the sparse (BM25) ranked list before fusion.
    pub sparse_weight: f64,
    /// Whether to include semantic search.
    pub use_semantic: bool,
    /// Whether to include BM25 search.
    pub use_bm25: bool,
    /// Restrict both search methods to this set of `doc_id`s, if any.
    pub doc_ids: Option<Vec<String>>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            rrf_k: 60,
            dense_weight: 1.0,
            sparse_weight: 1.0,
            use_semantic: true,
            use_bm25: true,
            doc_ids: None,
        }
    }
}

impl SearchConfig {
    /// Creates a new search config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the top-k limit.
    #[must_use]
    pub const fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Sets the similarity threshold.
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Sets the dense/sparse fusion weights.
    #[must_use]
    pub const fn with_weights(mut self, dense: f64, sparse: f64) -> Self {
        self.dense_weight = dense;
        self.sparse_weight = sparse;
        self
    }

    /// Enables or disables semantic search.
    #[must_use]
    pub const fn with_semantic(mut self, enabled: bool) -> Self {
        self.use_semantic = enabled;
        self
    }

    /// Enables or disables BM25 search.
    #[must_use]
    pub const fn with_bm25(mut self, enabled: bool) -> Self {
        self.use_bm25 = enabled;
        self
    }

    /// Restricts search to the given `doc_id`s.
    #[must_use]
    pub fn with_doc_ids(mut self, doc_ids: Option<Vec<String>>) -> Self {
        self.doc_ids = doc_ids;
        self
    }
}

/// Performs hybrid search combining semantic and BM25 results for a
/// single query string.
///
/// # Errors
///
/// Returns an error if the embedding backend or the storage queries fail.
pub fn hybrid_search(
    storage: &dyn Storage,
    embedder: &dyn Embedder,
    query: &str,
    config: &SearchConfig,
) -> Result<Vec<SearchResult>> {
    let mut semantic_results: Vec<(i64, f32)> = Vec::new();
    let mut bm25_results: Vec<(i64, f64)> = Vec::new();

    if config.use_semantic {
        semantic_results = semantic_search_raw(storage, embedder, query, config)?;
    }

    if config.use_bm25 {
        bm25_results = storage.search_fts(query, config.top_k * 2, config.doc_ids.as_deref())?;
    }

    if !config.use_semantic {
        return Ok(bm25_results
            .into_iter()
            .take(config.top_k)
            .map(|(row_id, score)| SearchResult {
                row_id,
                score,
                semantic_score: None,
                bm25_score: Some(score),
            })
            .collect());
    }

    if !config.use_bm25 {
        return Ok(semantic_results
            .into_iter()
            .take(config.top_k)
            .map(|(row_id, score)| SearchResult {
                row_id,
                score: f64::from(score),
                semantic_score: Some(score),
                bm25_score: None,
            })
            .collect());
    }

    let rrf_config = RrfConfig::new(config.rrf_k);
    let semantic_ranked: Vec<i64> = semantic_results.iter().map(|(id, _)| *id).collect();
    let bm25_ranked: Vec<i64> = bm25_results.iter().map(|(id, _)| *id).collect();

    let fused = weighted_rrf(
        &[
            (semantic_ranked.as_slice(), config.dense_weight),
            (bm25_ranked.as_slice(), config.sparse_weight),
        ],
        &rrf_config,
    );

    let semantic_map: std::collections::HashMap<i64, f32> = semantic_results.into_iter().collect();
    let bm25_map: std::collections::HashMap<i64, f64> = bm25_results.into_iter().collect();

    Ok(fused
        .into_iter()
        .take(config.top_k)
        .map(|(row_id, score)| SearchResult {
            row_id,
            score,
            semantic_score: semantic_map.get(&row_id).copied(),
            bm25_score: bm25_map.get(&row_id).copied(),
        })
        .collect())
}

/// Performs brute-force cosine-similarity search over stored embeddings.
fn semantic_search_raw(
    storage: &dyn Storage,
    embedder: &dyn Embedder,
    query: &str,
    config: &SearchConfig,
) -> Result<Vec<(i64, f32)>> {
    let query_embedding = embedder.embed(query)?;
    let all_embeddings = storage.get_all_embeddings(config.doc_ids.as_deref())?;

    if all_embeddings.is_empty() {
        return Ok(Vec::new());
    }

    let mut similarities: Vec<(i64, f32)> = all_embeddings
        .iter()
        .map(|(row_id, embedding)| (*row_id, cosine_similarity(&query_embedding, embedding)))
        .filter(|(_, sim)| *sim >= config.similarity_threshold)
        .collect();

    similarities.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    similarities.truncate(config.top_k * 2);

    Ok(similarities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{DEFAULT_DIMENSIONS, FallbackEmbedder};
    use crate::storage::{ChunkRow, DocumentRow, SqliteStorage};

    fn setup_storage() -> SqliteStorage {
        let mut storage = SqliteStorage::in_memory().unwrap();
        storage.init().unwrap();
        storage
    }

    fn setup_storage_with_chunks() -> SqliteStorage {
        let mut storage = setup_storage();
        storage
            .add_document(&DocumentRow {
                doc_id: "d1".into(),
                title: None,
                authors: None,
                original_filename: None,
                document_group_id: None,
            })
            .unwrap();

        let texts = [
            "The quick brown fox jumps over the lazy dog",
            "Machine learning is a subset of artificial intelligence",
            "Rust is a systems programming language",
        ];
        for (i, text) in texts.iter().enumerate() {
            storage
                .add_chunk(&ChunkRow {
                    chunk_id: format!("c{i}"),
                    doc_id: "d1".into(),
                    text: (*text).to_string(),
                    page: None,
                    chunk_index: Some(i),
                })
                .unwrap();
        }
        storage
    }

    #[test]
    fn test_search_config_default() {
        let config = SearchConfig::default();
        assert_eq!(config.top_k, DEFAULT_TOP_K);
        assert!((config.similarity_threshold - DEFAULT_SIMILARITY_THRESHOLD).abs() < f32::EPSILON);
        assert!(config.use_semantic);
        assert!(config.use_bm25);
    }

    #[test]
    fn test_search_bm25_only() {
        let storage = setup_storage_with_chunks();
        let config = SearchConfig::new().with_semantic(false).with_bm25(true);
        let embedder = FallbackEmbedder::new(DEFAULT_DIMENSIONS);
        let results = hybrid_search(&storage, &embedder, "fox", &config).unwrap();
        assert!(!results.is_empty());
        assert!(results[0].bm25_score.is_some());
        assert!(results[0].semantic_score.is_none());
    }

    #[test]
    fn test_search_bm25_no_results() {
        let storage = setup_storage_with_chunks();
        let config = SearchConfig::new().with_semantic(false).with_bm25(true);
        let embedder = FallbackEmbedder::new(DEFAULT_DIMENSIONS);
        let results = hybrid_search(&storage, &embedder, "xyz123nonexistent", &config).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_hybrid_search_semantic_only() {
        let mut storage = setup_storage_with_chunks();
        let embedder = FallbackEmbedder::new(DEFAULT_DIMENSIONS);

        for row_id in 1..=3i64 {
            let embedding = embedder.embed(&format!("chunk {row_id}")).unwrap();
            storage.store_embedding(row_id, &embedding).unwrap();
        }

        let config = SearchConfig::new()
            .with_semantic(true)
            .with_bm25(false)
            .with_threshold(0.0);

        let results = hybrid_search(&storage, &embedder, "programming language", &config).unwrap();
        assert!(!results.is_empty());
        assert!(results[0].semantic_score.is_some());
        assert!(results[0].bm25_score.is_none());
    }

    #[test]
    fn test_hybrid_search_both() {
        let mut storage = setup_storage_with_chunks();
        let embedder = FallbackEmbedder::new(DEFAULT_DIMENSIONS);
        for row_id in 1..=3i64 {
            let embedding = embedder.embed(&format!("chunk {row_id}")).unwrap();
            storage.store_embedding(row_id, &embedding).unwrap();
        }

        let config = SearchConfig::new()
            .with_semantic(true)
            .with_bm25(true)
            .with_threshold(0.0);

        let results = hybrid_search(&storage, &embedder, "programming", &config).unwrap();
        assert!(!results.is_empty());
    }

    #[test]
    fn test_hybrid_search_respects_doc_id_filter() {
        let mut storage = setup_storage_with_chunks();
        storage
            .add_document(&DocumentRow {
                doc_id: "d2".into(),
                title: None,
                authors: None,
                original_filename: None,
                document_group_id: None,
            })
            .unwrap();
        storage
            .add_chunk(&ChunkRow {
                chunk_id: "c-other".into(),
                doc_id: "d2".into(),
                text: "Rust is memory safe".into(),
                page: None,
                chunk_index: Some(0),
            })
            .unwrap();

        let config = SearchConfig::new()
            .with_semantic(false)
            .with_bm25(true)
            .with_doc_ids(Some(vec!["d1".to_string()]));
        let embedder = FallbackEmbedder::new(DEFAULT_DIMENSIONS);
        let results = hybrid_search(&storage, &embedder, "Rust", &config).unwrap();
        assert_eq!(results.len(), 1);
    }
}
