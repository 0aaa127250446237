//! Domain types used by the loader, the index and the answer pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

pub type DocId = String;

/// Metadata values keep the distinction between an absent field (`None`) and
/// an empty one (`Some("")`).
pub type Meta = BTreeMap<String, Option<serde_json::Value>>;

/// One corpus record after normalization.
///
/// - `id`: unique within a single load (explicit id field or `entry_<pos>`)
/// - `text_fields`: configured text fields in order, missing ones as `""`
/// - `metadata`: configured metadata fields, missing ones as `None`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub text_fields: Vec<(String, String)>,
    pub metadata: Meta,
}

impl Document {
    /// Render the text template: one `"<field>: <value>\n"` line per text field.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.text_fields {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.text_fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Render a JSON value as display text.
///
/// Strings stay bare, `null` becomes empty, and lists are joined with `", "`
/// (list items that are objects contribute their `name` field when present).
pub fn render_value(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Object(map) => match map.get("name") {
                    Some(name) => render_value(name),
                    None => item.to_string(),
                },
                other => render_value(other),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}

/// A bounded window of a document's text; the unit that gets embedded.
///
/// `span` is measured in Unicode scalar values of `Document::text()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub doc_id: DocId,
    pub chunk_index: usize,
    pub text: String,
    pub span: Range<usize>,
}

/// Which embedding space a vector belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmbedderIdentity {
    pub model_name: String,
    pub dimension: usize,
}

impl EmbedderIdentity {
    pub fn new(model_name: impl Into<String>, dimension: usize) -> Self {
        Self { model_name: model_name.into(), dimension }
    }
}

impl fmt::Display for EmbedderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (d={})", self.model_name, self.dimension)
    }
}

/// A scored passage returned by a retriever.
///
/// `position` is the ordinal of the entry inside the index; `score` is the raw
/// inner product of normalized vectors, so higher is always more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub chunk_index: usize,
    pub position: usize,
    pub score: f32,
    pub text: String,
    pub metadata: Meta,
}

impl SearchHit {
    pub fn meta_str(&self, key: &str) -> Option<String> {
        match self.metadata.get(key)? {
            Some(serde_json::Value::Null) | None => None,
            Some(value) => Some(render_value(value)),
        }
    }

    pub fn title(&self) -> Option<String> {
        self.meta_str("title")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }
}

/// Provider-neutral chat-completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub timeout: std::time::Duration,
}

/// The only parts of a completion the pipeline looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatCompletion {
    pub choices: Vec<ChatChoice>,
    /// Provider-reported error message when `choices` is empty.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatChoice {
    pub content: Option<String>,
    pub finish_reason: Option<String>,
}

impl ChatCompletion {
    pub fn single(content: impl Into<String>, finish_reason: &str) -> Self {
        Self {
            choices: vec![ChatChoice {
                content: Some(content.into()),
                finish_reason: Some(finish_reason.to_string()),
            }],
            error: None,
        }
    }

    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.content.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document {
            id: "p1".into(),
            text_fields: vec![
                ("title".into(), "Graph Neural Networks".into()),
                ("abstract".into(), String::new()),
            ],
            metadata: Meta::new(),
        }
    }

    #[test]
    fn text_template_keeps_empty_fields() {
        assert_eq!(doc().text(), "title: Graph Neural Networks\nabstract: \n");
        assert_eq!(doc().field("abstract"), Some(""));
        assert_eq!(doc().field("venue"), None);
    }

    #[test]
    fn hit_metadata_distinguishes_null_from_empty() {
        let mut metadata = Meta::new();
        metadata.insert("title".into(), Some(serde_json::json!("")));
        metadata.insert("year".into(), Some(serde_json::json!(2025)));
        metadata.insert("url".into(), None);
        let hit = SearchHit {
            doc_id: "p1".into(),
            chunk_index: 0,
            position: 0,
            score: 0.5,
            text: String::new(),
            metadata,
        };
        assert_eq!(hit.title().as_deref(), Some(""));
        assert_eq!(hit.meta_str("year").as_deref(), Some("2025"));
        assert_eq!(hit.meta_str("url"), None);
    }

    #[test]
    fn author_lists_render_joined() {
        let v = serde_json::json!(["Ada Lovelace", {"name": "Alan Turing"}, 3]);
        assert_eq!(render_value(&v), "Ada Lovelace, Alan Turing, 3");
        assert_eq!(render_value(&serde_json::Value::Null), "");
    }
}
