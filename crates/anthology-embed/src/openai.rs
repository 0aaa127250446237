use std::time::Duration;

use anthology_core::config::EmbeddingConfig;
use anthology_core::error::{Error, Result};
use anthology_core::traits::Embedder;
use anthology_core::types::EmbedderIdentity;
use anyhow::{anyhow, bail, Context};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::l2_normalize;

/// Client for an OpenAI-compatible `POST {base_url}/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dim: usize,
    max_len: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dim: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Embedding(anyhow!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            dim,
            max_len: 8191,
        })
    }

    pub fn from_config(cfg: &EmbeddingConfig) -> Result<Self> {
        let api_key = cfg
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::ConfigMissing("embedding.api_key (or OPENAI_API_KEY)".into()))?;
        let mut embedder = Self::new(
            &cfg.base_url,
            api_key,
            &cfg.model,
            cfg.dimension,
            Duration::from_secs(cfg.timeout_secs),
        )?;
        embedder.max_len = cfg.max_len;
        Ok(embedder)
    }
}

impl Embedder for OpenAiEmbedder {
    fn identity(&self) -> EmbedderIdentity {
        EmbedderIdentity::new(self.model.clone(), self.dim)
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url);
        debug!(count = texts.len(), %url, "requesting embeddings");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest { model: &self.model, input: texts })
            .send()
            .with_context(|| format!("embedding request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("embedding endpoint returned {status}: {body}");
        }
        let parsed: EmbeddingResponse = response.json().context("embedding response is not valid JSON")?;
        if parsed.data.len() != texts.len() {
            bail!("expected {} embeddings, got {}", texts.len(), parsed.data.len());
        }

        let mut ordered: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        for datum in parsed.data {
            if datum.embedding.len() != self.dim {
                bail!("embedding has dimension {}, expected {}", datum.embedding.len(), self.dim);
            }
            let slot = ordered
                .get_mut(datum.index)
                .ok_or_else(|| anyhow!("embedding index {} out of range", datum.index))?;
            let mut v = datum.embedding;
            l2_normalize(&mut v);
            *slot = Some(v);
        }
        ordered
            .into_iter()
            .enumerate()
            .map(|(i, v)| v.ok_or_else(|| anyhow!("missing embedding for input {i}")))
            .collect()
    }
}
