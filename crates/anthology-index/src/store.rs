//! On-disk layout of a persisted index.
//!
//! Three JSON artifacts live in the storage directory:
//! - docstore: build id and the entries, in index order
//! - vector store: build id, dimension and the vectors, in the same order
//! - index store: format version, build id, embedder identity, chunk
//!   parameters, counts, build time and blake3 checksums of the other two
//!
//! The docstore is written last and removed first, so its presence marks a
//! complete index.
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anthology_core::chunker::ChunkingConfig;
use anthology_core::config::IndexConfig;
use anthology_core::error::{Error, Result};
use anthology_core::types::EmbedderIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::index::{IndexEntry, VectorIndex};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct DocStore {
    pub build_id: String,
    pub entries: Vec<IndexEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VectorStore {
    pub build_id: String,
    pub dimension: usize,
    pub vectors: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStore {
    pub format_version: u32,
    pub build_id: String,
    pub identity: EmbedderIdentity,
    pub chunking: ChunkingConfig,
    pub document_count: usize,
    pub entry_count: usize,
    pub built_at: DateTime<Utc>,
    pub docstore_blake3: String,
    pub vector_store_blake3: String,
}

/// Where the three artifacts live.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    pub dir: PathBuf,
    pub docstore: PathBuf,
    pub vector_store: PathBuf,
    pub index_store: PathBuf,
}

impl StoragePaths {
    pub fn from_config(cfg: &IndexConfig) -> Self {
        let dir = cfg.storage_dir.clone();
        Self {
            docstore: dir.join(&cfg.docstore_file),
            vector_store: dir.join(&cfg.vector_store_file),
            index_store: dir.join(&cfg.index_store_file),
            dir,
        }
    }

    /// The docstore's presence is the existence check for a persisted index.
    pub fn exists(&self) -> bool {
        self.docstore.is_file()
    }

    fn corrupt(&self, reason: impl Into<String>) -> Error {
        Error::IndexCorrupt { dir: self.dir.clone(), reason: reason.into() }
    }
}

fn checksum(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Fresh identifier tying the three artifacts of one build together.
pub fn new_build_id(identity: &EmbedderIdentity, entry_count: usize) -> String {
    let now = Utc::now();
    let seed = format!(
        "{}:{}:{}:{}",
        now.timestamp_nanos_opt().unwrap_or_default(),
        std::process::id(),
        identity,
        entry_count
    );
    checksum(seed.as_bytes())[..16].to_string()
}

/// Write `index` atomically into `paths.dir`.
///
/// Every artifact goes to a synced temp file first. The old docstore is then
/// removed, the vector and index stores are renamed into place and the
/// docstore is renamed last. An interruption leaves either the previous
/// complete index or no docstore at all.
pub fn persist(paths: &StoragePaths, index: &VectorIndex) -> Result<IndexStore> {
    fs::create_dir_all(&paths.dir)?;

    let docstore_bytes = serde_json::to_vec(&DocStore {
        build_id: index.build_id().to_string(),
        entries: index.entries().to_vec(),
    })?;
    let vector_bytes = serde_json::to_vec(&VectorStore {
        build_id: index.build_id().to_string(),
        dimension: index.identity().dimension,
        vectors: index.vectors().to_vec(),
    })?;
    let meta = IndexStore {
        format_version: FORMAT_VERSION,
        build_id: index.build_id().to_string(),
        identity: index.identity().clone(),
        chunking: index.chunking(),
        document_count: index.document_count(),
        entry_count: index.len(),
        built_at: Utc::now(),
        docstore_blake3: checksum(&docstore_bytes),
        vector_store_blake3: checksum(&vector_bytes),
    };
    let meta_bytes = serde_json::to_vec_pretty(&meta)?;

    let docstore_tmp = write_synced(&paths.dir, &docstore_bytes)?;
    let vector_tmp = write_synced(&paths.dir, &vector_bytes)?;
    let meta_tmp = write_synced(&paths.dir, &meta_bytes)?;

    match fs::remove_file(&paths.docstore) {
        Ok(()) => debug!(path = %paths.docstore.display(), "removed previous docstore"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    vector_tmp.persist(&paths.vector_store).map_err(|e| e.error)?;
    meta_tmp.persist(&paths.index_store).map_err(|e| e.error)?;
    docstore_tmp.persist(&paths.docstore).map_err(|e| e.error)?;
    sync_dir(&paths.dir);

    info!(
        dir = %paths.dir.display(),
        build_id = %meta.build_id,
        entries = meta.entry_count,
        "index persisted"
    );
    Ok(meta)
}

fn write_synced(dir: &Path, bytes: &[u8]) -> io::Result<NamedTempFile> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(d) = fs::File::open(dir) {
        let _ = d.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

/// Read and verify a persisted index. Identity checks are left to the caller.
pub fn load(paths: &StoragePaths) -> Result<(VectorIndex, IndexStore)> {
    if !paths.exists() {
        return Err(Error::IndexNotFound {
            dir: paths.dir.clone(),
            artifact: file_name(&paths.docstore),
        });
    }
    let docstore_bytes = read_artifact(paths, &paths.docstore)?;
    let vector_bytes = read_artifact(paths, &paths.vector_store)?;
    let meta_bytes = read_artifact(paths, &paths.index_store)?;

    let meta: IndexStore = serde_json::from_slice(&meta_bytes)
        .map_err(|e| paths.corrupt(format!("unreadable {}: {e}", file_name(&paths.index_store))))?;
    if meta.format_version != FORMAT_VERSION {
        return Err(paths.corrupt(format!(
            "format version {} is not supported (expected {FORMAT_VERSION})",
            meta.format_version
        )));
    }
    if checksum(&docstore_bytes) != meta.docstore_blake3 {
        return Err(paths.corrupt("docstore checksum mismatch"));
    }
    if checksum(&vector_bytes) != meta.vector_store_blake3 {
        return Err(paths.corrupt("vector store checksum mismatch"));
    }

    let docstore: DocStore = serde_json::from_slice(&docstore_bytes)
        .map_err(|e| paths.corrupt(format!("unreadable {}: {e}", file_name(&paths.docstore))))?;
    let vectors: VectorStore = serde_json::from_slice(&vector_bytes)
        .map_err(|e| paths.corrupt(format!("unreadable {}: {e}", file_name(&paths.vector_store))))?;

    if docstore.build_id != meta.build_id || vectors.build_id != meta.build_id {
        return Err(paths.corrupt("artifacts belong to different builds"));
    }
    if docstore.entries.len() != meta.entry_count {
        return Err(paths.corrupt(format!(
            "index store records {} entries, docstore has {}",
            meta.entry_count,
            docstore.entries.len()
        )));
    }
    if vectors.dimension != meta.identity.dimension {
        return Err(paths.corrupt(format!(
            "vector store dimension {} != recorded dimension {}",
            vectors.dimension, meta.identity.dimension
        )));
    }

    let index = VectorIndex::new(
        meta.build_id.clone(),
        meta.identity.clone(),
        meta.chunking,
        docstore.entries,
        vectors.vectors,
    )
    .map_err(|reason| paths.corrupt(reason))?;
    Ok((index, meta))
}

fn read_artifact(paths: &StoragePaths, path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| paths.corrupt(format!("cannot read {}: {e}", file_name(path))))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anthology_core::types::Meta;
    use tempfile::TempDir;

    fn paths(dir: &Path) -> StoragePaths {
        StoragePaths::from_config(&IndexConfig { storage_dir: dir.to_path_buf(), ..IndexConfig::default() })
    }

    fn sample() -> VectorIndex {
        let identity = EmbedderIdentity::new("test", 2);
        VectorIndex::new(
            new_build_id(&identity, 2),
            identity,
            ChunkingConfig::default(),
            vec![
                IndexEntry { doc_id: "a".into(), chunk_index: 0, text: "alpha".into(), span: 0..5, metadata: Meta::new() },
                IndexEntry { doc_id: "b".into(), chunk_index: 0, text: "beta".into(), span: 3..7, metadata: Meta::new() },
            ],
            vec![vec![1.0, 0.0], vec![0.6, 0.8]],
        )
        .unwrap()
    }

    #[test]
    fn persist_then_load_preserves_entries_and_vectors() {
        let tmp = TempDir::new().unwrap();
        let p = paths(tmp.path());
        let idx = sample();
        let written = persist(&p, &idx).unwrap();

        let (loaded, meta) = load(&p).unwrap();
        assert_eq!(meta, written);
        assert_eq!(loaded.entries(), idx.entries());
        assert_eq!(loaded.vectors(), idx.vectors());
        assert_eq!(loaded.entries()[0].span, 0..5);
        assert_eq!(loaded.entries()[1].span, 3..7);
        assert_eq!(meta.document_count, 2);
    }

    #[test]
    fn tampered_vectors_fail_the_checksum() {
        let tmp = TempDir::new().unwrap();
        let p = paths(tmp.path());
        persist(&p, &sample()).unwrap();
        let text = fs::read_to_string(&p.vector_store).unwrap().replace("0.6", "0.7");
        fs::write(&p.vector_store, text).unwrap();
        assert!(matches!(load(&p), Err(Error::IndexCorrupt { .. })));
    }

    #[test]
    fn missing_index_store_is_corrupt_not_absent() {
        let tmp = TempDir::new().unwrap();
        let p = paths(tmp.path());
        persist(&p, &sample()).unwrap();
        fs::remove_file(&p.index_store).unwrap();
        assert!(matches!(load(&p), Err(Error::IndexCorrupt { .. })));
    }

    #[test]
    fn no_docstore_means_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = load(&paths(tmp.path())).unwrap_err();
        assert!(matches!(err, Error::IndexNotFound { ref artifact, .. } if artifact == "docstore.json"));
    }

    #[test]
    fn persist_leaves_no_temp_files_behind() {
        let tmp = TempDir::new().unwrap();
        let p = paths(tmp.path());
        persist(&p, &sample()).unwrap();
        persist(&p, &sample()).unwrap();
        let mut names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, ["default__vector_store.json", "docstore.json", "index_store.json"]);
    }
}
