use crate::error::LlmError;
use crate::types::{ChatCompletion, ChatRequest, EmbedderIdentity, SearchHit};

/// Maps text into a fixed embedding space.
///
/// Implementations must return L2-normalized vectors of `dim()` floats and
/// preserve input order in `embed_batch`.
pub trait Embedder: Send + Sync {
    fn identity(&self) -> EmbedderIdentity;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Top-k similarity search over an index.
pub trait Retriever: Send + Sync {
    /// Results are ordered by non-increasing score and never exceed `k`.
    fn search(&self, query: &str, k: usize) -> crate::error::Result<Vec<SearchHit>>;
}

/// A chat-completion capability (OpenAI-compatible or a test double).
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;
    fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, LlmError>;
}

impl<T: Embedder + ?Sized> Embedder for Box<T> {
    fn identity(&self) -> EmbedderIdentity { (**self).identity() }
    fn dim(&self) -> usize { (**self).dim() }
    fn max_len(&self) -> usize { (**self).max_len() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> { (**self).embed_batch(texts) }
}

impl<T: Embedder + ?Sized> Embedder for std::sync::Arc<T> {
    fn identity(&self) -> EmbedderIdentity { (**self).identity() }
    fn dim(&self) -> usize { (**self).dim() }
    fn max_len(&self) -> usize { (**self).max_len() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> { (**self).embed_batch(texts) }
}
