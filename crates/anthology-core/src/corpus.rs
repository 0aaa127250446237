//! Loads paper records from a JSON corpus into normalized [`Document`]s.
//!
//! The location is either one `.json` file holding a top-level array of
//! records, or a directory whose `*.json` files are read in sorted order.
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::{render_value, Document, Meta};

/// Metadata key recording which file a document came from.
pub const SOURCE_FILE_KEY: &str = "source_file";

/// Which record fields become the id, the embedded text and the metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusSchema {
    pub id_field: String,
    pub text_fields: Vec<String>,
    pub metadata_fields: Vec<String>,
}

impl Default for CorpusSchema {
    fn default() -> Self {
        Self {
            id_field: "id".into(),
            text_fields: vec!["title".into(), "abstract".into()],
            metadata_fields: vec!["title".into(), "author".into(), "year".into(), "url".into()],
        }
    }
}

pub struct CorpusLoader {
    location: PathBuf,
    schema: CorpusSchema,
}

impl CorpusLoader {
    pub fn new(location: impl Into<PathBuf>, schema: CorpusSchema) -> Self {
        Self { location: location.into(), schema }
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Load every record, logging instead of failing.
    ///
    /// An unreachable or malformed corpus yields an empty list.
    pub fn load(&self) -> Vec<Document> {
        match self.try_load() {
            Ok(docs) => docs,
            Err(e) => {
                warn!(error = %e, "corpus could not be loaded; continuing with no documents");
                Vec::new()
            }
        }
    }

    /// Load every record, surfacing `CorpusNotFound` / `CorpusMalformed`.
    pub fn try_load(&self) -> Result<Vec<Document>> {
        if self.location.is_dir() {
            return self.load_directory();
        }
        let mut state = LoadState::default();
        self.load_file(&self.location, &mut state)?;
        info!(documents = state.docs.len(), path = %self.location.display(), "loaded corpus");
        Ok(state.docs)
    }

    fn load_directory(&self) -> Result<Vec<Document>> {
        let files = list_json_files(&self.location);
        if files.is_empty() {
            warn!(dir = %self.location.display(), "no .json files found");
            return Ok(Vec::new());
        }
        let mut state = LoadState::default();
        for (i, file) in files.iter().enumerate() {
            debug!("reading corpus file {}/{}: {}", i + 1, files.len(), file.display());
            if let Err(e) = self.load_file(file, &mut state) {
                warn!(error = %e, "skipping corpus file");
            }
        }
        info!(
            documents = state.docs.len(),
            files = files.len(),
            dir = %self.location.display(),
            "loaded corpus"
        );
        Ok(state.docs)
    }

    fn load_file(&self, path: &Path, state: &mut LoadState) -> Result<()> {
        let bytes = fs::read(path).map_err(|e| {
            debug!(error = %e, path = %path.display(), "corpus read failed");
            Error::CorpusNotFound { path: path.to_path_buf() }
        })?;
        let root: Value = serde_json::from_slice(&bytes).map_err(|e| Error::CorpusMalformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let records = match root {
            Value::Array(records) => records,
            other => {
                return Err(Error::CorpusMalformed {
                    path: path.to_path_buf(),
                    reason: format!("expected a top-level array, found {}", json_kind(&other)),
                })
            }
        };

        let source = path.to_string_lossy().to_string();
        for record in records {
            let position = state.next_position;
            state.next_position += 1;
            let entry = match record {
                Value::Object(entry) => entry,
                other => {
                    warn!(position, kind = json_kind(&other), "skipping non-object record");
                    continue;
                }
            };
            let mut doc = self.normalize(&entry, position, &mut state.seen_ids);
            doc.metadata.insert(SOURCE_FILE_KEY.into(), Some(Value::String(source.clone())));
            state.docs.push(doc);
        }
        Ok(())
    }

    fn normalize(&self, entry: &Map<String, Value>, position: usize, seen: &mut HashSet<String>) -> Document {
        let mut id = match entry.get(&self.schema.id_field) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => format!("entry_{position}"),
        };
        if !seen.insert(id.clone()) {
            let mut unique = format!("{id}#{position}");
            let mut attempt = 1;
            while !seen.insert(unique.clone()) {
                unique = format!("{id}#{position}.{attempt}");
                attempt += 1;
            }
            warn!(id = %id, renamed = %unique, "duplicate document id");
            id = unique;
        }

        let text_fields = self
            .schema
            .text_fields
            .iter()
            .map(|field| {
                let value = entry.get(field).map(render_value).unwrap_or_default();
                (field.clone(), value)
            })
            .collect();

        let metadata: Meta = self
            .schema
            .metadata_fields
            .iter()
            .map(|field| (field.clone(), entry.get(field).filter(|v| !v.is_null()).cloned()))
            .collect();

        Document { id, text_fields, metadata }
    }
}

#[derive(Default)]
struct LoadState {
    docs: Vec<Document>,
    // Counts every record seen, skipped ones included.
    next_position: usize,
    seen_ids: HashSet<String>,
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn list_json_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();
    files.sort();
    files
}
