//! `RetrievalChunk` — a passage returned by the Retrieval Engine.

use serde::{Deserialize, Serialize};

use super::ids::{ChunkId, DocId};

/// Metadata carried alongside a retrieval chunk's text, describing the
/// source document it was extracted from. Fields mirror what an external
/// ingestion pipeline (out of scope for this engine) is expected to
/// populate; all are optional since provenance varies by corpus.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Document title, if known.
    pub title: Option<String>,
    /// Author list, if known.
    pub authors: Option<Vec<String>>,
    /// The original filename the document was ingested from.
    pub original_filename: Option<String>,
    /// Page number within the source document, if paginated.
    pub page: Option<u32>,
    /// Index of this chunk within its document's chunk sequence.
    pub chunk_index: Option<usize>,
}

/// A single passage of text retrieved from the document corpus, along
/// with its score from whichever retrieval pass produced it.
///
/// This is the engine's internal view of a chunk; it is read-only from
/// the perspective of this engine since ingestion owns chunk creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalChunk {
    /// Identifier, scoped to the document store.
    pub chunk_id: ChunkId,
    /// The document this chunk was extracted from.
    pub doc_id: DocId,
    /// The chunk's text content.
    pub text: String,
    /// Source document metadata.
    pub metadata: ChunkMetadata,
    /// Retrieval score (fused dense+sparse, or reranker score after a
    /// rerank pass). `None` before any scoring has been applied.
    pub score: Option<f64>,
}

impl RetrievalChunk {
    /// Returns a copy of this chunk with `score` replaced.
    #[must_use]
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_score_overwrites() {
        let chunk = RetrievalChunk {
            chunk_id: ChunkId::from("c1"),
            doc_id: DocId::from("d1"),
            text: "text".into(),
            metadata: ChunkMetadata::default(),
            score: None,
        };
        let scored = chunk.with_score(0.87);
        assert_eq!(scored.score, Some(0.87));
    }
}
