//! Error taxonomy shared by every crate in the workspace.
//!
//! Build-time failures abort a build. Query-time failures split into the
//! recoverable ones (classification, retrieval) that callers absorb and the
//! terminal ones (synthesis) that reach the end user as a [`FailureStatus`].

use std::path::PathBuf;

use thiserror::Error;

use crate::types::EmbedderIdentity;

#[derive(Debug, Error)]
pub enum Error {
    #[error("corpus not found at {path}")]
    CorpusNotFound { path: PathBuf },

    #[error("malformed corpus at {path}: {reason}")]
    CorpusMalformed { path: PathBuf, reason: String },

    /// `cause` says why the configured corpus yielded nothing, when known.
    #[error("no documents to index{}", cause_suffix(.cause))]
    NoDocuments { cause: Option<String> },

    #[error("index not found in {dir} (missing {artifact})")]
    IndexNotFound { dir: PathBuf, artifact: String },

    #[error("index in {dir} is corrupt: {reason}")]
    IndexCorrupt { dir: PathBuf, reason: String },

    #[error("index was built with {built} but the configured embedder is {configured}")]
    IndexModelMismatch {
        built: EmbedderIdentity,
        configured: EmbedderIdentity,
    },

    #[error("index has not been built or loaded yet")]
    IndexNotReady,

    #[error("no index to persist; build or load one first")]
    NoIndexToPersist,

    #[error("retrieval failed: {0}")]
    Retrieval(String),

    #[error("query classification failed: {0}")]
    Classification(#[source] LlmError),

    #[error("language model timed out after {seconds}s")]
    SynthesisTimeout { seconds: u64 },

    #[error("language model request failed: {0}")]
    SynthesisTransport(String),

    #[error("missing configuration: {0}")]
    ConfigMissing(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single chat-completion call.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode response: {0}")]
    Decode(String),
}

fn cause_suffix(cause: &Option<String>) -> String {
    cause.as_deref().map(|c| format!(": {c}")).unwrap_or_default()
}

/// Coarse classification of a failure as seen by the caller of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStatus {
    ConfigMissing,
    UpstreamTimeout,
    UpstreamError,
    Internal,
}

impl FailureStatus {
    pub fn http_code(self) -> u16 {
        match self {
            FailureStatus::ConfigMissing | FailureStatus::Internal => 500,
            FailureStatus::UpstreamTimeout => 503,
            FailureStatus::UpstreamError => 502,
        }
    }
}

impl Error {
    pub fn status(&self) -> FailureStatus {
        match self {
            Error::ConfigMissing(_) => FailureStatus::ConfigMissing,
            Error::SynthesisTimeout { .. } => FailureStatus::UpstreamTimeout,
            Error::SynthesisTransport(_) | Error::Embedding(_) => FailureStatus::UpstreamError,
            _ => FailureStatus::Internal,
        }
    }

    /// True for the failures the query path degrades around instead of surfacing.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Retrieval(_) | Error::Classification(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesis_failures_map_to_upstream_statuses() {
        let timeout = Error::SynthesisTimeout { seconds: 60 };
        assert_eq!(timeout.status(), FailureStatus::UpstreamTimeout);
        assert_eq!(timeout.status().http_code(), 503);

        let transport = Error::SynthesisTransport("connection reset".into());
        assert_eq!(transport.status(), FailureStatus::UpstreamError);
        assert!(!transport.is_recoverable());
    }

    #[test]
    fn config_missing_is_not_an_upstream_failure() {
        let err = Error::ConfigMissing("llm.api_key".into());
        assert_eq!(err.status(), FailureStatus::ConfigMissing);
        assert_eq!(err.status().http_code(), 500);
    }

    #[test]
    fn retrieval_and_classification_are_recoverable() {
        assert!(Error::Retrieval("index offline".into()).is_recoverable());
        assert!(Error::Classification(LlmError::Timeout).is_recoverable());
        assert!(!Error::IndexNotReady.is_recoverable());
    }
}
