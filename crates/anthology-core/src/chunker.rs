//! Sliding-window chunking over a document's rendered text.
//!
//! Windows are measured in Unicode scalar values so a boundary never splits a
//! code point. Consecutive chunks share exactly `chunk_overlap` characters and
//! the window stops as soon as the end of the text is covered.
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 2048, chunk_overlap: 200 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    fn stride(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    /// Split a document into ordered, overlapping windows.
    ///
    /// Always yields at least one chunk; an empty document yields one empty chunk.
    pub fn chunk(&self, doc: &Document) -> Vec<Chunk> {
        let text = doc.text();
        self.split_text(&text)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, (span, text))| Chunk {
                doc_id: doc.id.clone(),
                chunk_index,
                text,
                span,
            })
            .collect()
    }

    fn split_text(&self, text: &str) -> Vec<(std::ops::Range<usize>, String)> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut windows = Vec::with_capacity(total / self.config.stride() + 1);
        let mut start = 0usize;
        loop {
            let end = (start + self.config.chunk_size).min(total);
            windows.push((start..end, chars[start..end].iter().collect()));
            if end >= total {
                break;
            }
            start += self.config.stride();
        }
        windows
    }
}

/// Rebuild the original text from chunks by dropping the part of each chunk
/// already covered by its predecessors.
pub fn reassemble(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    let mut covered = 0usize;
    for chunk in chunks {
        let skip = covered.saturating_sub(chunk.span.start);
        out.extend(chunk.text.chars().skip(skip));
        covered = covered.max(chunk.span.end);
    }
    out
}
