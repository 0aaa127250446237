use anthology_core::chunker::ChunkingConfig;
use std::ops::Range;

use anthology_core::types::{Chunk, DocId, EmbedderIdentity, Meta, SearchHit};
use serde::{Deserialize, Serialize};

/// One indexed chunk. Its vector lives at the same position in
/// [`VectorIndex::vectors`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub doc_id: DocId,
    pub chunk_index: usize,
    pub text: String,
    /// Character range of `text` within the source document's text.
    pub span: Range<usize>,
    pub metadata: Meta,
}

impl IndexEntry {
    pub fn to_chunk(&self) -> Chunk {
        Chunk {
            doc_id: self.doc_id.clone(),
            chunk_index: self.chunk_index,
            text: self.text.clone(),
            span: self.span.clone(),
        }
    }
}

/// Immutable in-memory index: entries and their vectors in positional
/// correspondence, plus the embedding space and chunking they were built with.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    build_id: String,
    identity: EmbedderIdentity,
    chunking: ChunkingConfig,
    entries: Vec<IndexEntry>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Assemble an index, rejecting count or dimension disagreements.
    ///
    /// The error is a human-readable reason; callers wrap it in the error that
    /// fits their context.
    pub fn new(
        build_id: String,
        identity: EmbedderIdentity,
        chunking: ChunkingConfig,
        entries: Vec<IndexEntry>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, String> {
        if entries.len() != vectors.len() {
            return Err(format!(
                "{} entries but {} vectors",
                entries.len(),
                vectors.len()
            ));
        }
        if let Some((i, v)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != identity.dimension)
        {
            return Err(format!(
                "vector {i} has dimension {}, expected {}",
                v.len(),
                identity.dimension
            ));
        }
        Ok(Self { build_id, identity, chunking, entries, vectors })
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    pub fn identity(&self) -> &EmbedderIdentity {
        &self.identity
    }

    pub fn chunking(&self) -> ChunkingConfig {
        self.chunking
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn document_count(&self) -> usize {
        let mut ids: Vec<&str> = self.entries.iter().map(|e| e.doc_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }

    /// Chunks of one document in chunk order; feed them to
    /// [`anthology_core::chunker::reassemble`] to recover its text.
    pub fn document_chunks(&self, doc_id: &str) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> =
            self.entries.iter().filter(|e| e.doc_id == doc_id).map(IndexEntry::to_chunk).collect();
        chunks.sort_by_key(|c| c.chunk_index);
        chunks
    }

    /// Score every entry against `query` and keep the best `k`.
    ///
    /// Scores are inner products clamped to `[-1, 1]`; ties keep insertion
    /// order.
    pub fn top_k(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, dot(query, v).clamp(-1.0, 1.0)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        scored
            .into_iter()
            .map(|(position, score)| {
                let e = &self.entries[position];
                SearchHit {
                    doc_id: e.doc_id.clone(),
                    chunk_index: e.chunk_index,
                    position,
                    score,
                    text: e.text.clone(),
                    metadata: e.metadata.clone(),
                }
            })
            .collect()
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> IndexEntry {
        IndexEntry { doc_id: id.into(), chunk_index: 0, text: id.into(), span: 0..id.len(), metadata: Meta::new() }
    }

    fn index(vectors: Vec<Vec<f32>>) -> VectorIndex {
        let entries = (0..vectors.len()).map(|i| entry(&format!("d{i}"))).collect();
        VectorIndex::new(
            "b1".into(),
            EmbedderIdentity::new("test", 2),
            ChunkingConfig::default(),
            entries,
            vectors,
        )
        .unwrap()
    }

    #[test]
    fn count_mismatch_is_rejected() {
        let err = VectorIndex::new(
            "b".into(),
            EmbedderIdentity::new("test", 2),
            ChunkingConfig::default(),
            vec![entry("a"), entry("b")],
            vec![vec![1.0, 0.0]],
        )
        .unwrap_err();
        assert!(err.contains("2 entries but 1 vectors"));
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let err = VectorIndex::new(
            "b".into(),
            EmbedderIdentity::new("test", 2),
            ChunkingConfig::default(),
            vec![entry("a")],
            vec![vec![1.0, 0.0, 0.0]],
        )
        .unwrap_err();
        assert!(err.contains("dimension 3"));
    }

    #[test]
    fn ties_keep_insertion_order() {
        let idx = index(vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 0.0], vec![0.6, 0.8]]);
        let hits = idx.top_k(&[1.0, 0.0], 3);
        let positions: Vec<_> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, [1, 2, 3]);
    }

    #[test]
    fn top_k_never_pads() {
        let idx = index(vec![vec![1.0, 0.0]]);
        assert_eq!(idx.top_k(&[1.0, 0.0], 5).len(), 1);
    }
}
