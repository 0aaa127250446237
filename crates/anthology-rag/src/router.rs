//! Decides per question whether the paper index should be consulted.
use std::sync::Arc;
use std::time::Duration;

use anthology_core::error::LlmError;
use anthology_core::traits::ChatModel;
use anthology_core::types::{ChatMessage, ChatRequest};
use tracing::{debug, warn};

pub const CLASSIFIER_SYSTEM_PROMPT: &str = "You are an expert classification assistant. Your task is to determine if a user's query is related to academic papers for a conference. Respond with only 'yes' or 'no'.";

pub fn classification_prompt(question: &str) -> String {
    format!(
        "Is the following user query primarily asking about research papers, authors, specific research topics, keywords, or proceedings related to an academic conference? Your answer must be only 'yes' or 'no'.\n\nUser Query: \"{question}\""
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// The classifier answered yes.
    Retrieve,
    /// The classifier answered no.
    Direct,
    /// The reply contained neither word.
    FallbackUnrecognized(String),
    /// The classification call itself failed.
    FallbackError(String),
}

impl RouteDecision {
    pub fn needs_retrieval(&self) -> bool {
        matches!(self, RouteDecision::Retrieve)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub needs_retrieval: bool,
    pub decision: RouteDecision,
}

impl From<RouteDecision> for Classification {
    fn from(decision: RouteDecision) -> Self {
        Self { needs_retrieval: decision.needs_retrieval(), decision }
    }
}

/// Routing policy over the classifier's raw outcome.
///
/// "yes" anywhere in the reply wins over "no"; anything else, including a
/// failed call, falls back to answering without retrieval.
pub fn routing_decision(outcome: Result<&str, &LlmError>) -> RouteDecision {
    match outcome {
        Ok(content) => {
            let normalized = content.trim().to_lowercase();
            if normalized.contains("yes") {
                RouteDecision::Retrieve
            } else if normalized.contains("no") {
                RouteDecision::Direct
            } else {
                RouteDecision::FallbackUnrecognized(content.to_string())
            }
        }
        Err(e) => RouteDecision::FallbackError(e.to_string()),
    }
}

pub struct QueryRouter {
    model: Arc<dyn ChatModel>,
    timeout: Duration,
}

impl QueryRouter {
    pub fn new(model: Arc<dyn ChatModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Never fails: classifier errors are logged and routed to a direct answer.
    pub fn classify(&self, question: &str) -> Classification {
        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(CLASSIFIER_SYSTEM_PROMPT),
                ChatMessage::user(classification_prompt(question)),
            ],
            max_tokens: Some(5),
            temperature: Some(0.0),
            timeout: self.timeout,
        };
        let outcome = self.model.complete(&request).and_then(|completion| {
            if completion.choices.is_empty() {
                return Err(LlmError::Decode(
                    completion.error.unwrap_or_else(|| "no choices in classification response".into()),
                ));
            }
            Ok(completion.first_content().unwrap_or_default().to_string())
        });

        let decision = routing_decision(outcome.as_deref());
        match &decision {
            RouteDecision::Retrieve | RouteDecision::Direct => debug!(?decision, "query classified"),
            RouteDecision::FallbackUnrecognized(reply) => {
                warn!(reply = %reply, "unexpected classification reply; answering without retrieval")
            }
            RouteDecision::FallbackError(error) => {
                warn!(error = %error, "query classification failed; answering without retrieval")
            }
        }
        decision.into()
    }
}
