//! Setup shared by the operator binaries.
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anthology_core::config::{resolve_config_path, Config, LoggingConfig, Settings};
use anthology_core::traits::Embedder;
use anthology_core::types::SearchHit;
use anthology_embed::embedder_from_config;
use anthology_index::{FlatRetriever, IndexManager};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
pub fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if logging.format.eq_ignore_ascii_case("json") {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

/// Loaded configuration plus the embedder every command needs.
pub struct App {
    pub config: Config,
    pub settings: Settings,
    pub embedder: Arc<dyn Embedder>,
}

impl App {
    pub fn start(corpus_override: Option<&str>) -> anyhow::Result<Self> {
        let config = Config::load()?;
        let mut settings = config.settings()?;
        init_tracing(&settings.logging);
        if let Some(path) = corpus_override {
            settings.corpus.path = Some(resolve_config_path(config.base_dir(), path));
        }
        let embedder: Arc<dyn Embedder> = Arc::from(embedder_from_config(&settings.embedding)?);
        Ok(Self { config, settings, embedder })
    }

    pub fn manager(&self) -> IndexManager {
        IndexManager::new(self.settings.index.clone(), self.settings.corpus.clone(), Arc::clone(&self.embedder))
    }

    /// Load the persisted index, building it from the configured corpus if absent.
    pub fn retriever(&self) -> anyhow::Result<Arc<FlatRetriever>> {
        let index = self.manager().build(None, false)?;
        Ok(Arc::new(FlatRetriever::new(index, Arc::clone(&self.embedder))?))
    }

    pub fn corpus_path(&self) -> Option<PathBuf> {
        self.settings.corpus.path.clone()
    }
}

pub fn print_hits(hits: &[SearchHit]) {
    for (i, hit) in hits.iter().enumerate() {
        let title = hit.title().unwrap_or_else(|| hit.doc_id.clone());
        println!("\n  {}. score={:.4}  id={}  chunk={}", i + 1, hit.score, hit.doc_id, hit.chunk_index);
        println!("     📄 {}", title);
        let snippet: String = hit.text.trim().chars().take(200).collect();
        println!("     📝 {}", snippet.replace('\n', " "));
    }
}

/// Report a failure on one line and map it to a non-zero exit.
pub fn exit_on_error(result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Parse the value following a `--limit` style flag.
pub fn flag_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> anyhow::Result<T> {
    args.get(i + 1)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| anyhow::anyhow!("{flag} requires a value"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_values_are_parsed() {
        let args: Vec<String> = ["--limit", "7"].iter().map(|s| s.to_string()).collect();
        assert_eq!(flag_value::<usize>(&args, 0, "--limit").unwrap(), 7);
        assert!(flag_value::<usize>(&args, 1, "--limit").is_err());
        let bad: Vec<String> = ["--limit", "many"].iter().map(|s| s.to_string()).collect();
        assert!(flag_value::<usize>(&bad, 0, "--limit").is_err());
    }
}
