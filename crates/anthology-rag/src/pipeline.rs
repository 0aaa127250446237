//! The caller-facing question-answering operation.
use std::sync::Arc;

use anthology_core::config::Settings;
use anthology_core::error::{Error, FailureStatus, Result};
use anthology_core::traits::{ChatModel, Retriever};
use anthology_core::types::{Meta, SearchHit};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use tracing::{info, warn};

use crate::context::ContextAssembler;
use crate::llm::OpenAiChatClient;
use crate::router::QueryRouter;
use crate::synthesizer::AnswerSynthesizer;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self { question: question.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: Option<String>,
    pub score: f32,
    pub metadata: Meta,
}

impl From<&SearchHit> for Source {
    fn from(hit: &SearchHit) -> Self {
        Self { title: hit.title(), score: hit.score, metadata: hit.metadata.clone() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    /// Present only when the index was consulted successfully.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
}

#[derive(Debug, Clone, PartialEq, ThisError, Serialize, Deserialize)]
#[error("{message}")]
pub struct QueryFailure {
    pub status: FailureStatus,
    pub message: String,
}

impl From<Error> for QueryFailure {
    fn from(e: Error) -> Self {
        Self { status: e.status(), message: e.to_string() }
    }
}

/// Classify, optionally retrieve, then synthesize.
///
/// Classification and retrieval failures degrade the answer; only synthesis
/// failures reach the caller as a [`QueryFailure`].
pub struct QueryPipeline {
    router: QueryRouter,
    retriever: Arc<dyn Retriever>,
    assembler: ContextAssembler,
    synthesizer: AnswerSynthesizer,
    top_k: usize,
}

impl QueryPipeline {
    pub fn new(
        router: QueryRouter,
        retriever: Arc<dyn Retriever>,
        assembler: ContextAssembler,
        synthesizer: AnswerSynthesizer,
        top_k: usize,
    ) -> Self {
        Self { router, retriever, assembler, synthesizer, top_k }
    }

    /// Wire the pipeline from settings around one chat model.
    pub fn with_model(settings: &Settings, model: Arc<dyn ChatModel>, retriever: Arc<dyn Retriever>) -> Self {
        let llm = &settings.llm;
        Self::new(
            QueryRouter::new(Arc::clone(&model), llm.classification_timeout()),
            retriever,
            ContextAssembler::new(settings.retrieval.max_papers),
            AnswerSynthesizer::new(model, llm.synthesis_timeout(), Some(llm.temperature)),
            settings.retrieval.top_k,
        )
    }

    /// Wire the pipeline against the configured OpenAI-compatible endpoint.
    ///
    /// Missing model or API key is reported here, once, as `ConfigMissing`.
    pub fn from_settings(settings: &Settings, retriever: Arc<dyn Retriever>) -> Result<Self> {
        let client = OpenAiChatClient::from_config(&settings.llm)?;
        info!(model = %settings.llm.model, base_url = %settings.llm.base_url, "chat model configured");
        Ok(Self::with_model(settings, Arc::new(client), retriever))
    }

    pub fn ask(&self, request: QueryRequest) -> std::result::Result<QueryResponse, QueryFailure> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(QueryFailure {
                status: FailureStatus::Internal,
                message: "question must not be empty".to_string(),
            });
        }

        let classification = self.router.classify(question);
        let retrieval = classification
            .needs_retrieval
            .then(|| self.retriever.search(question, self.top_k));
        if let Some(Err(e)) = &retrieval {
            warn!(error = %e, "retrieval failed; answering with an apology note");
        }

        let messages = self
            .assembler
            .build_messages(question, &classification.decision, retrieval.as_ref());
        let answer = self.synthesizer.synthesize(messages).map_err(|e| {
            warn!(error = %e, status = ?e.status(), "answer synthesis failed");
            QueryFailure::from(e)
        })?;

        let sources = match retrieval {
            Some(Ok(hits)) => Some(
                hits.iter()
                    .take(self.assembler.max_papers())
                    .map(Source::from)
                    .collect(),
            ),
            _ => None,
        };
        Ok(QueryResponse { answer, sources })
    }
}
