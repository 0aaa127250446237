//! Blocking client for OpenAI-compatible `/chat/completions` endpoints
//! (OpenRouter by default).
use anthology_core::config::LlmConfig;
use anthology_core::error::{LlmError, Result};
use anthology_core::traits::ChatModel;
use anthology_core::types::{ChatChoice, ChatCompletion, ChatMessage, ChatRequest};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub struct OpenAiChatClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    referer: Option<String>,
    title: Option<String>,
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<RawChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawChoice {
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ProviderError {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ProviderError,
}

impl OpenAiChatClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            referer: None,
            title: None,
        }
    }

    /// Extra attribution headers (`HTTP-Referer`, `X-Title`) understood by OpenRouter.
    pub fn with_attribution(mut self, referer: Option<String>, title: Option<String>) -> Self {
        self.referer = referer;
        self.title = title;
        self
    }

    /// Fails with `ConfigMissing` when the model or API key is not configured.
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let (model, api_key) = cfg.require_credentials()?;
        Ok(Self::new(&cfg.base_url, api_key, model).with_attribution(cfg.referer.clone(), cfg.title.clone()))
    }
}

fn transport_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::Transport(e.to_string())
    }
}

impl ChatModel for OpenAiChatClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn complete(&self, request: &ChatRequest) -> std::result::Result<ChatCompletion, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = CompletionBody {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: false,
        };
        debug!(%url, messages = request.messages.len(), timeout_secs = request.timeout.as_secs_f32(), "chat completion");

        let mut builder = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(request.timeout)
            .json(&body);
        if let Some(referer) = &self.referer {
            builder = builder.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.title {
            builder = builder.header("X-Title", title);
        }

        let response = builder.send().map_err(transport_error)?;
        let status = response.status();
        let text = response.text().map_err(transport_error)?;
        if !status.is_success() {
            let body = serde_json::from_str::<ErrorEnvelope>(&text)
                .ok()
                .and_then(|env| env.error.message)
                .unwrap_or(text);
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let parsed: CompletionResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::Decode(e.to_string()))?;
        Ok(ChatCompletion {
            choices: parsed
                .choices
                .into_iter()
                .map(|c| ChatChoice {
                    content: c.message.and_then(|m| m.content),
                    finish_reason: c.finish_reason,
                })
                .collect(),
            error: parsed.error.map(|e| match e.get("message").and_then(|m| m.as_str()) {
                Some(message) => message.to_string(),
                None => e.to_string(),
            }),
        })
    }
}
