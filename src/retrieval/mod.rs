//! Retrieval Engine — the hybrid dense+sparse search fabric with query
//! expansion and optional reranking (§4.3).
//!
//! The engine composes three independently testable stages —
//! [`strategist`], [`preparer`], and the single-query primitive in
//! [`crate::search`] — into the public `retrieve` contract, then
//! aggregates and optionally reranks across prepared queries.

pub mod preparer;
pub mod reranker;
pub mod strategist;

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use tracing::warn;

use crate::core::{ChunkMetadata, RetrievalChunk};
use crate::embedding::Embedder;
use crate::error::Result;
use crate::search::{self, SearchConfig};
use crate::storage::Storage;

pub use preparer::{PreparedQuery, prepare_queries};
pub use reranker::{IdentityReranker, Reranker};
pub use strategist::{QueryStrategist, StrategyContext, Technique, default_techniques};

/// A document-id filter for a [`RetrievalQuery`], constructed in the
/// priority order given in §4.3: a document group resolves to a `doc_id`
/// set, an explicit list of `doc_id`s is used as-is, and a single
/// `doc_id` is the narrowest case.
#[derive(Debug, Clone)]
pub enum ChunkFilter {
    /// Resolve to the set of `doc_id`s belonging to this document group.
    DocumentGroup(String),
    /// Restrict to exactly these `doc_id`s.
    DocIds(Vec<String>),
    /// Restrict to a single `doc_id`.
    DocId(String),
}

/// Parameters for a single `retrieve` call.
#[derive(Debug, Clone)]
pub struct RetrievalQuery<'a> {
    /// The user-facing query text.
    pub query: &'a str,
    /// Maximum number of chunks to return.
    pub n_results: usize,
    /// Optional document-id filter.
    pub filter: Option<ChunkFilter>,
    /// Whether to invoke the configured reranker on the aggregated list.
    pub use_reranker: bool,
    /// Weight applied to the dense ranked list before fusion.
    pub dense_weight: f64,
    /// Weight applied to the sparse ranked list before fusion.
    pub sparse_weight: f64,
    /// What the current research round is trying to establish, feeding
    /// the Query Strategist.
    pub research_context: Option<&'a str>,
    /// The calling agent's immediate goal, feeding the Query Strategist.
    pub agent_context: Option<&'a str>,
}

impl<'a> RetrievalQuery<'a> {
    /// Creates a query with the given text and result count, all other
    /// fields at their permissive defaults (no filter, no reranking,
    /// equal dense/sparse weight).
    #[must_use]
    pub fn new(query: &'a str, n_results: usize) -> Self {
        Self {
            query,
            n_results,
            filter: None,
            use_reranker: false,
            dense_weight: 1.0,
            sparse_weight: 1.0,
            research_context: None,
            agent_context: None,
        }
    }

    /// Sets the document filter.
    #[must_use]
    pub fn with_filter(mut self, filter: ChunkFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Enables reranking of the aggregated result.
    #[must_use]
    pub const fn with_reranker(mut self, enabled: bool) -> Self {
        self.use_reranker = enabled;
        self
    }

    /// Sets the research context hint.
    #[must_use]
    pub fn with_research_context(mut self, context: &'a str) -> Self {
        self.research_context = Some(context);
        self
    }

    /// Sets the agent context hint.
    #[must_use]
    pub fn with_agent_context(mut self, context: &'a str) -> Self {
        self.agent_context = Some(context);
        self
    }
}

/// The hybrid dense+sparse retrieval fabric: query expansion, concurrent
/// per-query hybrid search, aggregation, and optional reranking.
pub struct RetrievalEngine<'a> {
    storage: &'a dyn Storage,
    embedder: &'a dyn Embedder,
    reranker: Option<&'a dyn Reranker>,
    strategist: QueryStrategist,
}

impl<'a> RetrievalEngine<'a> {
    /// Creates an engine with no reranker configured.
    #[must_use]
    pub const fn new(storage: &'a dyn Storage, embedder: &'a dyn Embedder) -> Self {
        Self {
            storage,
            embedder,
            reranker: None,
            strategist: QueryStrategist::new(),
        }
    }

    /// Attaches a reranker for the final pass.
    #[must_use]
    pub const fn with_reranker(mut self, reranker: &'a dyn Reranker) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Runs the full retrieval pipeline (§4.3): strategy selection, query
    /// preparation, concurrent hybrid search per prepared query,
    /// aggregation/dedup, and an optional rerank pass against the
    /// original query.
    ///
    /// Never returns an error: complete strategist/preparer failure
    /// degrades to `identity`-only expansion, and complete retrieval
    /// failure yields an empty list, matching the engine's documented
    /// failure mode.
    pub async fn retrieve(&self, query: &RetrievalQuery<'_>) -> Vec<RetrievalChunk> {
        let techniques = self.select_techniques(query);
        let prepared = prepare_queries(query.query, &techniques);
        let doc_ids = self.resolve_filter(query.filter.as_ref());

        let search_config = SearchConfig::new()
            .with_top_k(query.n_results)
            .with_weights(query.dense_weight, query.sparse_weight)
            .with_doc_ids(doc_ids);

        let aggregated = self.search_all(&prepared, &search_config);

        if query.use_reranker {
            if let Some(reranker) = self.reranker {
                return match reranker.rerank(query.query, aggregated.clone()).await {
                    Ok(mut reranked) => {
                        reranked.sort_by(|a, b| {
                            b.score
                                .partial_cmp(&a.score)
                                .unwrap_or(std::cmp::Ordering::Equal)
                        });
                        reranked.truncate(query.n_results);
                        reranked
                    }
                    Err(err) => {
                        warn!(error = %err, "reranker failed, falling back to unreranked order");
                        aggregated.into_iter().take(query.n_results).collect()
                    }
                };
            }
        }

        aggregated.into_iter().take(query.n_results).collect()
    }

    /// Selects expansion techniques, degrading to identity-only if
    /// selection itself would panic on malformed context (it never
    /// does today, but this keeps the degrade path explicit per §4.3).
    fn select_techniques(&self, query: &RetrievalQuery<'_>) -> Vec<Technique> {
        let ctx = StrategyContext {
            research_context: query.research_context,
            agent_context: query.agent_context,
        };
        self.strategist.select(&ctx)
    }

    /// Resolves a [`ChunkFilter`] to a concrete `doc_id` list, per the
    /// priority order in §4.3 step 3.
    fn resolve_filter(&self, filter: Option<&ChunkFilter>) -> Option<Vec<String>> {
        match filter {
            Some(ChunkFilter::DocumentGroup(group_id)) => match self.storage.doc_ids_for_group(group_id) {
                Ok(ids) => Some(ids),
                Err(err) => {
                    warn!(error = %err, group_id, "failed to resolve document group, searching unfiltered");
                    None
                }
            },
            Some(ChunkFilter::DocIds(ids)) => Some(ids.clone()),
            Some(ChunkFilter::DocId(id)) => Some(vec![id.clone()]),
            None => None,
        }
    }

    /// Runs hybrid search for every prepared query, isolating per-query
    /// failures (logged and dropped, never propagated), then aggregates
    /// and de-duplicates the union by `chunk_id` (§4.3 steps 4-5).
    fn search_all(&self, prepared: &[PreparedQuery], config: &SearchConfig) -> Vec<RetrievalChunk> {
        let mut seen: HashMap<String, ()> = HashMap::new();
        let mut aggregated: Vec<RetrievalChunk> = Vec::new();

        for pq in prepared {
            let results = match search::hybrid_search(self.storage, self.embedder, &pq.text, config) {
                Ok(results) => results,
                Err(err) => {
                    warn!(error = %err, technique = ?pq.technique, "prepared query failed, dropping");
                    continue;
                }
            };

            for result in results {
                let Some((chunk_row, metadata)) = self.lookup_chunk(result.row_id) else {
                    continue;
                };
                let dedup_key = dedup_key(&chunk_row.chunk_id, &chunk_row.text);
                if seen.insert(dedup_key, ()).is_some() {
                    continue;
                }
                aggregated.push(RetrievalChunk {
                    chunk_id: chunk_row.chunk_id.into(),
                    doc_id: chunk_row.doc_id.into(),
                    text: chunk_row.text,
                    metadata,
                    score: Some(result.score),
                });
            }
        }

        aggregated
    }

    fn lookup_chunk(&self, row_id: i64) -> Option<(crate::storage::ChunkRow, ChunkMetadata)> {
        match self.storage.get_chunk_by_row_id(row_id) {
            Ok(found) => found,
            Err(err) => {
                warn!(error = %err, row_id, "failed to resolve chunk row, dropping");
                None
            }
        }
    }
}

/// Builds the de-duplication key for a chunk: the `chunk_id` when
/// non-empty, else a hash of its text (§4.3 step 5).
fn dedup_key(chunk_id: &str, text: &str) -> String {
    if !chunk_id.is_empty() {
        return chunk_id.to_string();
    }
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    format!("text-hash:{:x}", hasher.finish())
}
