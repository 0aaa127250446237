//! Embedding providers behind [`anthology_core::traits::Embedder`].
use anthology_core::config::{EmbeddingConfig, EmbeddingProviderKind};
use anthology_core::error::{Error, Result};
use anthology_core::traits::Embedder;
use tracing::info;

mod hash;
mod openai;

#[cfg(feature = "local-model")]
mod device;
#[cfg(feature = "local-model")]
mod local;
#[cfg(feature = "local-model")]
mod pool;
#[cfg(feature = "local-model")]
mod tokenize;

pub use hash::HashEmbedder;
pub use openai::OpenAiEmbedder;

#[cfg(feature = "local-model")]
pub use device::select_device;
#[cfg(feature = "local-model")]
pub use local::LocalBertEmbedder;
#[cfg(feature = "local-model")]
pub use pool::masked_mean_l2;
#[cfg(feature = "local-model")]
pub use tokenize::tokenize_batch;

/// Scale `v` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

fn fake_embeddings_forced() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Build the embedder selected by `embedding.provider`.
///
/// `APP_USE_FAKE_EMBEDDINGS=1` forces the hashing embedder regardless of the
/// configured provider.
pub fn embedder_from_config(cfg: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    if fake_embeddings_forced() || cfg.provider == EmbeddingProviderKind::Hash {
        info!(dim = cfg.dimension, "using hashing embedder");
        return Ok(Box::new(HashEmbedder::new(cfg.dimension)));
    }
    match cfg.provider {
        EmbeddingProviderKind::OpenAi => {
            let embedder = OpenAiEmbedder::from_config(cfg)?;
            info!(model = %cfg.model, base_url = %cfg.base_url, "using OpenAI-compatible embedder");
            Ok(Box::new(embedder))
        }
        EmbeddingProviderKind::Local => local_from_config(cfg),
        EmbeddingProviderKind::Hash => Ok(Box::new(HashEmbedder::new(cfg.dimension))),
    }
}

#[cfg(feature = "local-model")]
fn local_from_config(cfg: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    let dir = cfg
        .model_dir
        .as_deref()
        .ok_or_else(|| Error::ConfigMissing("embedding.model_dir".into()))?;
    let embedder = LocalBertEmbedder::load(dir, &cfg.model, cfg.max_len).map_err(Error::Embedding)?;
    if embedder.dim() != cfg.dimension {
        return Err(Error::InvalidConfig(format!(
            "embedding.dimension is {} but the model in {} produces {}",
            cfg.dimension,
            dir.display(),
            embedder.dim()
        )));
    }
    Ok(Box::new(embedder))
}

#[cfg(not(feature = "local-model"))]
fn local_from_config(_cfg: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    Err(Error::InvalidConfig(
        "embedding.provider = \"local\" needs a build with the `local-model` feature".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_produces_unit_vectors() {
        let mut v = vec![3.0f32, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6 && (v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0f32; 3];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0; 3]);
    }

    #[test]
    fn openai_provider_without_key_is_config_missing() {
        let cfg = EmbeddingConfig {
            provider: EmbeddingProviderKind::OpenAi,
            api_key: None,
            ..EmbeddingConfig::default()
        };
        if fake_embeddings_forced() {
            return;
        }
        assert!(matches!(embedder_from_config(&cfg), Err(Error::ConfigMissing(_))));
    }
}
