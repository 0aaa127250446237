use std::fs;
use std::sync::Arc;

use anthology_core::chunker::Chunker;
use anthology_core::config::{CorpusConfig, IndexConfig};
use anthology_core::corpus::CorpusLoader;
use anthology_core::error::{Error, Result};
use anthology_core::traits::Embedder;
use anthology_core::types::Document;
use anyhow::anyhow;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::index::{IndexEntry, VectorIndex};
use crate::store::{self, StoragePaths};

/// Lifecycle of the index held by an [`IndexManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Unbuilt,
    BuiltInMemory,
    Persisted,
}

enum Slot {
    Unbuilt,
    BuiltInMemory(Arc<VectorIndex>),
    Persisted(Arc<VectorIndex>),
}

/// Owns the index for one storage directory: builds it from a corpus,
/// persists it, reloads it and hands out shared read-only handles.
pub struct IndexManager {
    config: IndexConfig,
    corpus: CorpusConfig,
    embedder: Arc<dyn Embedder>,
    paths: StoragePaths,
    slot: Slot,
}

impl IndexManager {
    pub fn new(config: IndexConfig, corpus: CorpusConfig, embedder: Arc<dyn Embedder>) -> Self {
        let paths = StoragePaths::from_config(&config);
        Self { config, corpus, embedder, paths, slot: Slot::Unbuilt }
    }

    pub fn state(&self) -> IndexState {
        match self.slot {
            Slot::Unbuilt => IndexState::Unbuilt,
            Slot::BuiltInMemory(_) => IndexState::BuiltInMemory,
            Slot::Persisted(_) => IndexState::Persisted,
        }
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        Arc::clone(&self.embedder)
    }

    /// Build the index, or load the persisted one unless `force_rebuild`.
    ///
    /// With `documents == None` the configured corpus is loaded.
    pub fn build(&mut self, documents: Option<Vec<Document>>, force_rebuild: bool) -> Result<Arc<VectorIndex>> {
        fs::create_dir_all(&self.paths.dir)?;
        if self.paths.exists() && !force_rebuild {
            info!(dir = %self.paths.dir.display(), "persisted index found, loading instead of rebuilding");
            return self.load();
        }

        let documents = match documents {
            Some(docs) => docs,
            None => self.load_corpus()?,
        };
        if documents.is_empty() {
            return Err(Error::NoDocuments { cause: None });
        }

        let index = Arc::new(self.embed_documents(&documents)?);
        self.slot = Slot::BuiltInMemory(Arc::clone(&index));
        self.persist()?;
        Ok(index)
    }

    fn load_corpus(&self) -> Result<Vec<Document>> {
        let path = self
            .corpus
            .path
            .as_deref()
            .ok_or_else(|| Error::ConfigMissing("corpus.path".into()))?;
        let documents = CorpusLoader::new(path, self.corpus.schema()).try_load().map_err(|e| {
            warn!(error = %e, "corpus could not be loaded");
            Error::NoDocuments { cause: Some(e.to_string()) }
        })?;
        if documents.is_empty() {
            return Err(Error::NoDocuments {
                cause: Some(format!("corpus at {} has no usable records", path.display())),
            });
        }
        Ok(documents)
    }

    fn embed_documents(&self, documents: &[Document]) -> Result<VectorIndex> {
        let chunker = Chunker::new(self.config.chunking())?;
        let identity = self.embedder.identity();
        let chunked: Vec<_> = documents.iter().map(|d| (d, chunker.chunk(d))).collect();
        let total: usize = chunked.iter().map(|(_, c)| c.len()).sum();
        info!(documents = documents.len(), chunks = total, embedder = %identity, "building index");

        let pb = self.progress_bar(total as u64);
        let mut entries = Vec::with_capacity(total);
        let mut vectors = Vec::with_capacity(total);
        for (doc, chunks) in chunked {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            for batch in texts.chunks(self.config.embed_batch_size) {
                let embedded = self.embedder.embed_batch(batch).map_err(Error::Embedding)?;
                if embedded.len() != batch.len() {
                    return Err(Error::Embedding(anyhow!(
                        "embedder returned {} vectors for {} chunks of {}",
                        embedded.len(),
                        batch.len(),
                        doc.id
                    )));
                }
                if let Some(v) = embedded.iter().find(|v| v.len() != identity.dimension) {
                    return Err(Error::Embedding(anyhow!(
                        "embedder returned a {}-dimensional vector, {} expects {}",
                        v.len(),
                        identity.model_name,
                        identity.dimension
                    )));
                }
                vectors.extend(embedded);
                pb.inc(batch.len() as u64);
            }
            entries.extend(chunks.into_iter().map(|c| IndexEntry {
                doc_id: c.doc_id,
                chunk_index: c.chunk_index,
                text: c.text,
                span: c.span,
                metadata: doc.metadata.clone(),
            }));
            pb.set_message(doc.id.clone());
        }
        pb.finish_with_message("embedded");

        let build_id = store::new_build_id(&identity, entries.len());
        VectorIndex::new(build_id, identity, chunker.config(), entries, vectors)
            .map_err(|reason| Error::Embedding(anyhow!(reason)))
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }

    /// Load the persisted index and check it belongs to the configured embedder.
    pub fn load(&mut self) -> Result<Arc<VectorIndex>> {
        let (index, meta) = store::load(&self.paths)?;
        let configured = self.embedder.identity();
        if meta.identity != configured {
            return Err(Error::IndexModelMismatch { built: meta.identity, configured });
        }
        let current = self.config.chunking();
        if meta.chunking != current {
            warn!(
                stored_size = meta.chunking.chunk_size,
                stored_overlap = meta.chunking.chunk_overlap,
                configured_size = current.chunk_size,
                configured_overlap = current.chunk_overlap,
                "index was built with different chunk parameters; rebuild with --force to apply the new ones"
            );
        }
        info!(
            entries = index.len(),
            build_id = %meta.build_id,
            built_at = %meta.built_at,
            "index loaded"
        );
        let index = Arc::new(index);
        self.slot = Slot::Persisted(Arc::clone(&index));
        Ok(index)
    }

    pub fn persist(&mut self) -> Result<()> {
        let index = match &self.slot {
            Slot::Unbuilt => return Err(Error::NoIndexToPersist),
            Slot::BuiltInMemory(index) | Slot::Persisted(index) => Arc::clone(index),
        };
        store::persist(&self.paths, &index)?;
        self.slot = Slot::Persisted(index);
        Ok(())
    }

    pub fn get_index(&self) -> Result<Arc<VectorIndex>> {
        match &self.slot {
            Slot::Unbuilt => Err(Error::IndexNotReady),
            Slot::BuiltInMemory(index) | Slot::Persisted(index) => Ok(Arc::clone(index)),
        }
    }
}
