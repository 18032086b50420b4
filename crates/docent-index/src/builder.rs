//! Offline index construction: walk, extract, chunk, embed, save.

use std::io::IsTerminal;
use std::path::Path;

use docent_core::{BuildStats, ChunkingConfig, DocentError, SkippedFile};
use docent_ingest::chunker::chunk_document;
use docent_ingest::extract::TextExtractor;
use docent_ingest::walker::walk_docs;
use indicatif::{ProgressBar, ProgressStyle};

use crate::embedding::{Embedder, EmbeddingService};
use crate::store::Index;

/// Builds an index file from a directory of documents.
///
/// Documents that fail extraction or yield no text are skipped and reported
/// in [`BuildStats::skipped`]. The build fails, writing nothing, if no
/// supported documents exist, if no chunks survive, or if embedding fails.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use docent_core::DocentConfig;
/// use docent_index::builder::IndexBuilder;
/// use docent_index::embedding::{Embedder, EmbeddingClient};
/// use docent_ingest::extract::DefaultExtractor;
///
/// # async fn example() {
/// let config = DocentConfig::default();
/// let client = EmbeddingClient::with_config(&config.embedding).unwrap();
/// let builder = IndexBuilder::new(
///     Embedder::from_config(client, &config.embedding),
///     DefaultExtractor::from_config(&config.ingest),
///     config.chunking.clone(),
/// );
/// let stats = builder.build(Path::new("docs"), Path::new(".docent/index.json")).await.unwrap();
/// println!("indexed {} chunks from {} files", stats.chunk_count, stats.file_count);
/// # }
/// ```
pub struct IndexBuilder<S, X> {
    embedder: Embedder<S>,
    extractor: X,
    chunking: ChunkingConfig,
    exclude: Vec<String>,
    show_progress: bool,
}

impl<S: EmbeddingService, X: TextExtractor> IndexBuilder<S, X> {
    pub fn new(embedder: Embedder<S>, extractor: X, chunking: ChunkingConfig) -> Self {
        Self {
            embedder,
            extractor,
            chunking,
            exclude: Vec::new(),
            show_progress: false,
        }
    }

    /// Glob patterns, relative to the docs directory, to leave out.
    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }

    /// Draw an embedding progress bar when stderr is a terminal.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Index every supported document under `docs_dir` into `out_file`.
    ///
    /// # Errors
    ///
    /// - [`DocentError::Config`] if `docs_dir` does not exist
    /// - [`DocentError::EmptyCorpus`] if there is nothing to index
    /// - embedding errors once retries are exhausted
    /// - [`DocentError::IndexIntegrity`] if the provider returns vectors of
    ///   differing dimension
    pub async fn build(&self, docs_dir: &Path, out_file: &Path) -> Result<BuildStats, DocentError> {
        let files = walk_docs(docs_dir, &self.exclude)?;
        if files.is_empty() {
            return Err(DocentError::EmptyCorpus(format!(
                "no indexable files found under {} (supported: pdf, docx, pptx, txt, md, csv)",
                docs_dir.display()
            )));
        }
        tracing::info!(files = files.len(), docs_dir = %docs_dir.display(), "building index");

        let mut chunks = Vec::new();
        let mut skipped = Vec::new();
        let mut file_count = 0;

        for file in &files {
            let text = match self.extractor.extract(file).await {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(path = %file.path.display(), error = %err, "skipping unreadable document");
                    skipped.push(SkippedFile {
                        path: file.path.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            if text.trim().is_empty() {
                tracing::warn!(path = %file.path.display(), "skipping document with no extractable text");
                skipped.push(SkippedFile {
                    path: file.path.clone(),
                    reason: "no extractable text".into(),
                });
                continue;
            }

            let doc_chunks = chunk_document(&text, &file.path, &self.chunking);
            if doc_chunks.is_empty() {
                skipped.push(SkippedFile {
                    path: file.path.clone(),
                    reason: "no passages above the minimum length".into(),
                });
                continue;
            }
            tracing::debug!(path = %file.path.display(), chunks = doc_chunks.len(), "chunked");
            file_count += 1;
            chunks.extend(doc_chunks);
        }

        if chunks.is_empty() {
            return Err(DocentError::EmptyCorpus(format!(
                "no indexable text in {} supported file(s) under {}",
                files.len(),
                docs_dir.display()
            )));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let progress = self.progress_bar(texts.len());
        let vectors = self
            .embedder
            .embed_batch_with_progress(&texts, |done| {
                if let Some(pb) = &progress {
                    pb.set_position(done as u64);
                }
            })
            .await;
        if let Some(pb) = &progress {
            pb.finish_and_clear();
        }
        let vectors = vectors?;

        let dim = check_dimensions(&vectors)?;
        let docs_dir_abs = std::fs::canonicalize(docs_dir)?;
        let index = Index::new(
            self.embedder.model(),
            chunks,
            vectors,
            &docs_dir_abs.to_string_lossy(),
        )?;
        index.save_atomic(out_file)?;

        tracing::info!(
            files = file_count,
            chunks = index.len(),
            dim,
            skipped = skipped.len(),
            out = %out_file.display(),
            "index written"
        );

        Ok(BuildStats {
            file_count,
            chunk_count: index.len(),
            dim,
            skipped,
        })
    }

    fn progress_bar(&self, total: usize) -> Option<ProgressBar> {
        if !self.show_progress || !std::io::stderr().is_terminal() {
            return None;
        }
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner:.cyan} embedding [{bar:30.cyan/blue}] {pos}/{len} chunks ({elapsed})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        Some(pb)
    }
}

/// The first vector's length is the index dimension; all others must match.
fn check_dimensions(vectors: &[Vec<f32>]) -> Result<usize, DocentError> {
    let dim = vectors
        .first()
        .map(Vec::len)
        .ok_or_else(|| DocentError::Embedding("provider returned no vectors".into()))?;
    if dim == 0 {
        return Err(DocentError::IndexIntegrity(
            "provider returned zero-length vectors".into(),
        ));
    }
    if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dim) {
        return Err(DocentError::IndexIntegrity(format!(
            "embedding {i} has dimension {}, expected {dim}",
            v.len()
        )));
    }
    Ok(dim)
}
