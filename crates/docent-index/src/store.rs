//! The persisted index: chunks, their unit-length vectors, and build metadata.
//!
//! On disk the index is a single UTF-8 JSON object:
//!
//! ```text
//! {model, dim, chunks: [{id, source_name, source_path, section?, text, order}],
//!  vectors: [[f32]], created_at, docs_dir}
//! ```
//!
//! Writes go through a temporary file in the target directory followed by a
//! rename, so a reader sees either the previous index or the new one.

use std::collections::HashSet;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use docent_core::{Chunk, DocentError};
use serde::{Deserialize, Serialize};

/// An immutable collection of chunks and their embeddings.
///
/// `vectors[i]` is the embedding of `chunks[i].text`. Construction and
/// loading both go through [`Index::validate`].
///
/// # Examples
///
/// ```
/// use docent_core::Chunk;
/// use docent_index::store::Index;
///
/// let chunk = Chunk {
///     id: "p:0:c".into(),
///     source_name: "faq.md".into(),
///     source_path: "/docs/faq.md".into(),
///     section: None,
///     text: "Office hours are nine to five.".into(),
///     order: 0,
/// };
/// let index = Index::new("text-embedding-3-small", vec![chunk], vec![vec![1.0, 0.0]], "/docs").unwrap();
/// assert_eq!(index.dim(), 2);
/// assert_eq!(index.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    model: String,
    dim: usize,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
    created_at: DateTime<Utc>,
    docs_dir: String,
}

/// Summary of a loaded index, for `stats` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub model: String,
    pub dim: usize,
    pub chunk_count: usize,
    /// Distinct source documents.
    pub document_count: usize,
    pub created_at: DateTime<Utc>,
    pub docs_dir: String,
}

impl Index {
    /// Assemble an index stamped with the current time. `dim` is taken from
    /// the first vector.
    ///
    /// # Errors
    ///
    /// Returns [`DocentError::IndexIntegrity`] if the parts are inconsistent.
    pub fn new(
        model: &str,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
        docs_dir: &str,
    ) -> Result<Self, DocentError> {
        let index = Self {
            model: model.to_string(),
            dim: vectors.first().map_or(0, Vec::len),
            chunks,
            vectors,
            created_at: Utc::now(),
            docs_dir: docs_dir.to_string(),
        };
        index.validate()?;
        Ok(index)
    }

    /// Check the structural invariants: one vector per chunk, every vector
    /// of length `dim`, and unique chunk ids.
    ///
    /// # Errors
    ///
    /// Returns [`DocentError::IndexIntegrity`] describing the first violation.
    pub fn validate(&self) -> Result<(), DocentError> {
        if self.chunks.len() != self.vectors.len() {
            return Err(DocentError::IndexIntegrity(format!(
                "{} chunks but {} vectors",
                self.chunks.len(),
                self.vectors.len()
            )));
        }
        if !self.vectors.is_empty() && self.dim == 0 {
            return Err(DocentError::IndexIntegrity("dim must be positive".into()));
        }
        if let Some((i, v)) = self
            .vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != self.dim)
        {
            return Err(DocentError::IndexIntegrity(format!(
                "vector {i} has length {}, expected dim {}",
                v.len(),
                self.dim
            )));
        }

        let mut seen = HashSet::with_capacity(self.chunks.len());
        for chunk in &self.chunks {
            if !seen.insert(chunk.id.as_str()) {
                return Err(DocentError::IndexIntegrity(format!(
                    "duplicate chunk id {}",
                    chunk.id
                )));
            }
        }
        Ok(())
    }

    /// Read and validate an index file. An index without chunks is rejected.
    ///
    /// # Errors
    ///
    /// - [`DocentError::FileNotFound`] if `path` does not exist
    /// - [`DocentError::IndexIntegrity`] if it is malformed, inconsistent, or empty
    pub fn load(path: &Path) -> Result<Self, DocentError> {
        if !path.exists() {
            return Err(DocentError::FileNotFound(path.to_path_buf()));
        }
        let file = std::fs::File::open(path)?;
        let index: Self = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            DocentError::IndexIntegrity(format!("{} is not a valid index: {e}", path.display()))
        })?;
        index.validate()?;
        if index.is_empty() {
            return Err(DocentError::IndexIntegrity(format!(
                "{} contains no chunks",
                path.display()
            )));
        }
        tracing::debug!(
            path = %path.display(),
            chunks = index.len(),
            dim = index.dim,
            model = %index.model,
            "loaded index"
        );
        Ok(index)
    }

    /// Write the index to `path` atomically, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`DocentError::Io`] or [`DocentError::Serialization`] if
    /// writing fails; the previous file at `path`, if any, is untouched.
    pub fn save_atomic(&self, path: &Path) -> Result<(), DocentError> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| DocentError::Io(e.error))?;
        Ok(())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn docs_dir(&self) -> &str {
        &self.docs_dir
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        let documents: HashSet<&str> = self
            .chunks
            .iter()
            .map(|c| c.source_path.as_str())
            .collect();
        IndexStats {
            model: self.model.clone(),
            dim: self.dim,
            chunk_count: self.chunks.len(),
            document_count: documents.len(),
            created_at: self.created_at,
            docs_dir: self.docs_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(path: &str, order: usize) -> Chunk {
        Chunk {
            id: format!("{path}:{order}"),
            source_name: path.rsplit('/').next().unwrap_or(path).to_string(),
            source_path: path.to_string(),
            section: None,
            text: format!("passage {order} of {path}"),
            order,
        }
    }

    fn sample() -> Index {
        Index::new(
            "test-model",
            vec![chunk("/d/a.md", 0), chunk("/d/a.md", 1), chunk("/d/b.md", 0)],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.6, 0.8]],
            "/d",
        )
        .unwrap()
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let err = Index::new("m", vec![chunk("/d/a.md", 0)], vec![], "/d").unwrap_err();
        assert!(matches!(err, DocentError::IndexIntegrity(_)));
    }

    #[test]
    fn dim_mismatch_is_rejected() {
        let err = Index::new(
            "m",
            vec![chunk("/d/a.md", 0), chunk("/d/a.md", 1)],
            vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]],
            "/d",
        )
        .unwrap_err();
        assert!(err.to_string().contains("vector 1"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = Index::new(
            "m",
            vec![chunk("/d/a.md", 0), chunk("/d/a.md", 0)],
            vec![vec![1.0], vec![1.0]],
            "/d",
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/index.json");
        let index = sample();
        index.save_atomic(&path).unwrap();

        let loaded = Index::load(&path).unwrap();
        assert_eq!(loaded, index);
        assert_eq!(
            std::fs::read_dir(path.parent().unwrap()).unwrap().count(),
            1,
            "temporary file left behind"
        );
    }

    #[test]
    fn file_uses_documented_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        sample().save_atomic(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        for key in ["model", "dim", "chunks", "vectors", "created_at", "docs_dir"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["dim"], 2);
        assert_eq!(json["chunks"][0]["source_path"], "/d/a.md");
    }

    #[test]
    fn save_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, "old").unwrap();
        sample().save_atomic(&path).unwrap();
        assert!(Index::load(&path).is_ok());
    }

    #[test]
    fn load_missing_file() {
        let err = Index::load(Path::new("/no/such/index.json")).unwrap_err();
        assert!(matches!(err, DocentError::FileNotFound(_)));
    }

    #[test]
    fn load_rejects_tampered_dim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        sample().save_atomic(&path).unwrap();

        let mut json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        json["dim"] = serde_json::json!(3);
        std::fs::write(&path, json.to_string()).unwrap();

        let err = Index::load(&path).unwrap_err();
        assert!(matches!(err, DocentError::IndexIntegrity(_)));
    }

    #[test]
    fn load_rejects_garbage_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Index::load(&path).unwrap_err(),
            DocentError::IndexIntegrity(_)
        ));

        let empty = Index::new("m", vec![], vec![], "/d").unwrap();
        empty.save_atomic(&path).unwrap();
        let err = Index::load(&path).unwrap_err();
        assert!(err.to_string().contains("no chunks"));
    }

    #[test]
    fn stats_count_documents() {
        let stats = sample().stats();
        assert_eq!(stats.chunk_count, 3);
        assert_eq!(stats.document_count, 2);
        assert_eq!(stats.dim, 2);
        assert_eq!(stats.model, "test-model");
    }
}
