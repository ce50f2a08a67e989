//! Reranker — the narrow interface for an out-of-scope concrete reranker
//! client (§4.3, §9 Glossary: "the narrow interface for the out-of-scope
//! concrete reranker client").

use async_trait::async_trait;

use crate::core::RetrievalChunk;
use crate::error::Result;

/// Reorders an aggregated chunk list against the original query.
///
/// Implementations are expected to call out to a cross-encoder or
/// reranking API; this crate provides no concrete implementation beyond
/// [`IdentityReranker`], matching the spec's instruction that concrete
/// reranker clients are external collaborators.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Reorders `chunks` by relevance to `query`, returning chunks with
    /// `score` overwritten by the reranker's own scale.
    ///
    /// # Errors
    ///
    /// Returns an error if the reranking backend is unreachable or
    /// rejects the request. Callers fall back to unreranked order on
    /// error (§4.3 Failure) rather than propagating it to the mission.
    async fn rerank(&self, query: &str, chunks: Vec<RetrievalChunk>) -> Result<Vec<RetrievalChunk>>;
}

/// A no-op reranker that returns its input unchanged, used when no
/// reranker is configured. Distinguishing "no reranker configured" from
/// "reranker enabled but unavailable" is the caller's job (`retrieve`
/// only invokes a reranker when one was supplied).
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityReranker;

#[async_trait]
impl Reranker for IdentityReranker {
    async fn rerank(&self, _query: &str, chunks: Vec<RetrievalChunk>) -> Result<Vec<RetrievalChunk>> {
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ChunkId, ChunkMetadata, DocId};

    fn chunk(id: &str) -> RetrievalChunk {
        RetrievalChunk {
            chunk_id: ChunkId::from(id),
            doc_id: DocId::from("d1"),
            text: "text".into(),
            metadata: ChunkMetadata::default(),
            score: None,
        }
    }

    #[tokio::test]
    async fn test_identity_reranker_preserves_order() {
        let reranker = IdentityReranker;
        let chunks = vec![chunk("a"), chunk("b")];
        let out = reranker.rerank("q", chunks).await.unwrap();
        assert_eq!(out[0].chunk_id.as_str(), "a");
        assert_eq!(out[1].chunk_id.as_str(), "b");
    }
}
