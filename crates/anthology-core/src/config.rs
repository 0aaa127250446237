//! Layered configuration and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`,
//! `config.<env>.toml` and `APP_*` env vars (nested keys split on `__`,
//! e.g. `APP_LLM__MODEL`). Provides helpers to expand `~` and `${VAR}` and to
//! resolve relative paths against the directory the config was loaded from.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chunker::ChunkingConfig;
use crate::corpus::CorpusSchema;
use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let cwd = env::current_dir()?;
        Self::load_from(&cwd)
    }

    /// Load with config files looked up in `dir`; relative paths resolve against it.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, base_dir: dir.to_path_buf() };
        config.settings()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("failed to get '{key}': {e}")))
    }

    /// Extract, resolve and validate the typed settings.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.apply_env_secrets();
        settings.resolve_paths(&self.base_dir);
        settings.validate()?;
        Ok(settings)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub corpus: CorpusConfig,
    pub index: IndexConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub path: Option<PathBuf>,
    pub id_field: String,
    pub text_fields: Vec<String>,
    pub metadata_fields: Vec<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            path: None,
            id_field: "id".to_string(),
            text_fields: vec!["title".to_string(), "abstract".to_string()],
            metadata_fields: vec![
                "title".to_string(),
                "author".to_string(),
                "year".to_string(),
                "url".to_string(),
            ],
        }
    }
}

impl CorpusConfig {
    pub fn schema(&self) -> CorpusSchema {
        CorpusSchema {
            id_field: self.id_field.clone(),
            text_fields: self.text_fields.clone(),
            metadata_fields: self.metadata_fields.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub storage_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub docstore_file: String,
    pub vector_store_file: String,
    pub index_store_file: String,
    pub embed_batch_size: usize,
    pub show_progress: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("./storage"),
            chunk_size: 2048,
            chunk_overlap: 200,
            docstore_file: "docstore.json".to_string(),
            vector_store_file: "default__vector_store.json".to_string(),
            index_store_file: "index_store.json".to_string(),
            embed_batch_size: 64,
            show_progress: true,
        }
    }
}

impl IndexConfig {
    pub fn chunking(&self) -> ChunkingConfig {
        ChunkingConfig { chunk_size: self.chunk_size, chunk_overlap: self.chunk_overlap }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Deterministic token hashing; offline, for tests and development.
    Hash,
    /// OpenAI-compatible `/embeddings` endpoint.
    OpenAi,
    /// BERT-family model loaded from `model_dir`.
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub model: String,
    pub dimension: usize,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model_dir: Option<PathBuf>,
    pub max_len: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Hash,
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            dimension: 384,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model_dir: None,
            max_len: 256,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub classification_timeout_secs: u64,
    pub synthesis_timeout_secs: u64,
    pub referer: Option<String>,
    pub title: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "google/gemini-flash-1.5".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: None,
            temperature: 0.1,
            classification_timeout_secs: 10,
            synthesis_timeout_secs: 60,
            referer: None,
            title: None,
        }
    }
}

impl LlmConfig {
    /// Model name and API key, or `ConfigMissing` naming the absent key.
    pub fn require_credentials(&self) -> Result<(&str, &str)> {
        if self.model.trim().is_empty() {
            return Err(Error::ConfigMissing("llm.model".to_string()));
        }
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok((self.model.as_str(), key)),
            _ => Err(Error::ConfigMissing(
                "llm.api_key (or OPENROUTER_API_KEY)".to_string(),
            )),
        }
    }

    pub fn classification_timeout(&self) -> Duration {
        Duration::from_secs(self.classification_timeout_secs)
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub max_papers: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3, max_papers: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl Settings {
    fn apply_env_secrets(&mut self) {
        if self.llm.api_key.is_none() {
            self.llm.api_key = env::var("OPENROUTER_API_KEY").ok().filter(|k| !k.is_empty());
        }
        if self.embedding.api_key.is_none() {
            self.embedding.api_key = env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        }
    }

    fn resolve_paths(&mut self, base: &Path) {
        self.index.storage_dir = resolve_config_path(base, &self.index.storage_dir.to_string_lossy());
        if let Some(p) = self.corpus.path.take() {
            self.corpus.path = Some(resolve_config_path(base, &p.to_string_lossy()));
        }
        if let Some(p) = self.embedding.model_dir.take() {
            self.embedding.model_dir = Some(resolve_config_path(base, &p.to_string_lossy()));
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.index.chunking().validate()?;
        if self.retrieval.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be at least 1".into()));
        }
        if self.retrieval.max_papers == 0 {
            return Err(Error::InvalidConfig("retrieval.max_papers must be at least 1".into()));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::InvalidConfig("embedding.dimension must be positive".into()));
        }
        if self.index.embed_batch_size == 0 {
            return Err(Error::InvalidConfig("index.embed_batch_size must be positive".into()));
        }
        Ok(())
    }
}

/// Expand `~` and `$VAR`/`${VAR}` in `raw` and anchor a relative result at `base`.
///
/// Unknown variables are left as written.
pub fn resolve_config_path(base: &Path, raw: &str) -> PathBuf {
    let expanded = match shellexpand::full(raw) {
        Ok(full) => PathBuf::from(full.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw).as_ref()),
    };
    if expanded.is_relative() {
        base.join(expanded)
    } else {
        expanded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_match_the_paper_pipeline() {
        let s = Settings::default();
        assert_eq!(s.index.chunk_size, 2048);
        assert_eq!(s.index.chunk_overlap, 200);
        assert_eq!(s.retrieval.top_k, 3);
        assert_eq!(s.llm.classification_timeout_secs, 10);
        assert_eq!(s.llm.synthesis_timeout_secs, 60);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn files_and_env_layer_over_defaults() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("RUST_ENV", "test");
            jail.create_file(
                "config.toml",
                r#"
                [index]
                storage_dir = "idx"
                chunk_size = 512
                chunk_overlap = 64

                [corpus]
                path = "data/papers.json"
                "#,
            )?;
            jail.create_file("config.test.toml", "[retrieval]\ntop_k = 5\n")?;
            jail.set_env("APP_LLM__MODEL", "openai/gpt-4o-mini");

            let config = Config::load_from(jail.directory()).expect("load");
            let s = config.settings().expect("settings");
            assert_eq!(s.index.chunk_size, 512);
            assert_eq!(s.retrieval.top_k, 5);
            assert_eq!(s.llm.model, "openai/gpt-4o-mini");
            assert_eq!(s.index.storage_dir, jail.directory().join("idx"));
            assert_eq!(s.corpus.path, Some(jail.directory().join("data/papers.json")));
            assert_eq!(config.get::<usize>("index.chunk_overlap").expect("get"), 64);
            Ok(())
        });
    }

    #[test]
    fn overlap_not_smaller_than_size_is_rejected() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("config.toml", "[index]\nchunk_size = 100\nchunk_overlap = 100\n")?;
            let err = Config::load_from(jail.directory()).err().expect("must fail");
            assert!(matches!(err, Error::InvalidConfig(_)), "got {err:?}");
            Ok(())
        });
    }

    #[test]
    fn api_key_falls_back_to_openrouter_env() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("OPENROUTER_API_KEY", "sk-test");
            let s = Config::load_from(jail.directory()).expect("load").settings().expect("settings");
            let (model, key) = s.llm.require_credentials().expect("credentials");
            assert_eq!(model, "google/gemini-flash-1.5");
            assert_eq!(key, "sk-test");
            Ok(())
        });
    }

    #[test]
    fn missing_api_key_is_config_missing() {
        let llm = LlmConfig::default();
        assert!(matches!(llm.require_credentials(), Err(Error::ConfigMissing(_))));
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let base = Path::new("/srv/anthology");
        assert_eq!(resolve_config_path(base, "/tmp/idx"), PathBuf::from("/tmp/idx"));
        assert_eq!(resolve_config_path(base, "idx"), PathBuf::from("/srv/anthology/idx"));
    }

    #[test]
    fn env_vars_expand_and_unknown_ones_stay_relative() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("ANTHOLOGY_DATA", "/data/papers");
            let base = Path::new("/srv/anthology");
            assert_eq!(
                resolve_config_path(base, "${ANTHOLOGY_DATA}/acl.json"),
                PathBuf::from("/data/papers/acl.json")
            );
            assert_eq!(
                resolve_config_path(base, "$ANTHOLOGY_UNSET/idx"),
                PathBuf::from("/srv/anthology/$ANTHOLOGY_UNSET/idx")
            );
            Ok(())
        });
    }
}
