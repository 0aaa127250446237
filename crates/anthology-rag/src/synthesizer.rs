use std::sync::Arc;
use std::time::Duration;

use anthology_core::error::{Error, LlmError, Result};
use anthology_core::traits::ChatModel;
use anthology_core::types::{ChatMessage, ChatRequest};
use tracing::{debug, warn};

/// Appended to an answer the model cut short at its output limit.
pub const TRUNCATION_MARKER: &str = "\n\n[Response truncated: the model reached its output limit.]";

pub const NO_CONTENT_PLACEHOLDER: &str = "[No response content received from the model.]";

fn finished_without_content(reason: &str) -> String {
    format!("[The model finished due to {reason} without generating a response. Please try rephrasing your query.]")
}

pub struct AnswerSynthesizer {
    model: Arc<dyn ChatModel>,
    timeout: Duration,
    temperature: Option<f32>,
}

impl AnswerSynthesizer {
    pub fn new(model: Arc<dyn ChatModel>, timeout: Duration, temperature: Option<f32>) -> Self {
        Self { model, timeout, temperature }
    }

    pub fn synthesize(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let request = ChatRequest {
            messages,
            max_tokens: None,
            temperature: self.temperature,
            timeout: self.timeout,
        };
        let completion = self.model.complete(&request).map_err(|e| match e {
            LlmError::Timeout => Error::SynthesisTimeout { seconds: self.timeout.as_secs() },
            other => Error::SynthesisTransport(other.to_string()),
        })?;

        let Some(choice) = completion.choices.first() else {
            let detail = completion
                .error
                .map(|m| format!("provider error: {m}"))
                .unwrap_or_else(|| "the model returned no choices".to_string());
            return Err(Error::SynthesisTransport(detail));
        };

        let content = choice.content.as_deref().unwrap_or_default();
        let reason = choice.finish_reason.as_deref();
        debug!(model = self.model.model_name(), finish_reason = ?reason, chars = content.len(), "answer received");

        if content.is_empty() {
            return Ok(match reason {
                Some(r) if r != "stop" => finished_without_content(r),
                _ => NO_CONTENT_PLACEHOLDER.to_string(),
            });
        }
        if reason == Some("length") {
            warn!("answer was truncated at the model's output limit");
            return Ok(format!("{content}{TRUNCATION_MARKER}"));
        }
        Ok(content.to_string())
    }
}
