use std::sync::Arc;

use anthology_core::error::{Error, Result};
use anthology_core::traits::{Embedder, Retriever};
use anthology_core::types::SearchHit;
use tracing::debug;

use crate::index::VectorIndex;

/// Exhaustive inner-product search over a [`VectorIndex`].
pub struct FlatRetriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
}

impl FlatRetriever {
    /// Fails with `IndexModelMismatch` when the embedder does not produce
    /// vectors in the index's embedding space.
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let configured = embedder.identity();
        if &configured != index.identity() {
            return Err(Error::IndexModelMismatch { built: index.identity().clone(), configured });
        }
        Ok(Self { index, embedder })
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

impl Retriever for FlatRetriever {
    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(Error::InvalidConfig("k must be at least 1".into()));
        }
        if self.index.is_empty() {
            return Ok(Vec::new());
        }
        let q = self
            .embedder
            .embed(query)
            .map_err(|e| Error::Retrieval(format!("query embedding failed: {e}")))?;
        if q.len() != self.index.identity().dimension {
            return Err(Error::Retrieval(format!(
                "query vector has dimension {}, index expects {}",
                q.len(),
                self.index.identity().dimension
            )));
        }
        let hits = self.index.top_k(&q, k);
        debug!(k, returned = hits.len(), "search complete");
        Ok(hits)
    }
}
