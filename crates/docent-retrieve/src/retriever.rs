//! Question → ranked passages.
//!
//! [`HybridRetriever`] fuses semantic similarity with IDF-weighted keyword
//! overlap, diversifies the best candidates with MMR, then pulls in adjacent
//! chunks from the same document. [`RetrieverStrategy`] picks between it and
//! [`SubprocessRetriever`] from configuration.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;

use docent_core::{DocentConfig, DocentError, RetrievalConfig, RetrievalStrategy, ScoredChunk};
use docent_index::embedding::{Embedder, EmbeddingService};
use docent_index::store::Index;

use crate::lexical::{distinct_tokens, normalize_keyword_score, IdfTable};
use crate::mmr;
use crate::subprocess::SubprocessRetriever;

/// Knobs for one retrieval call.
///
/// # Examples
///
/// ```
/// use docent_retrieve::retriever::RetrievalParams;
///
/// let params = RetrievalParams { top_k: 3, ..RetrievalParams::default() };
/// assert_eq!(params.max_results(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalParams {
    /// Passages chosen by MMR.
    pub top_k: usize,
    /// Neighbors pulled in on each side of a chosen passage.
    pub neighbor_window: usize,
    /// Semantic weight in the fused score; keyword weight is `1 - alpha`.
    pub alpha: f64,
    /// MMR relevance/diversity trade-off.
    pub mmr_lambda: f64,
    /// Best-scoring chunks considered by MMR.
    pub candidate_pool: usize,
    /// Extra results kept after neighbor expansion.
    pub slack: usize,
}

impl RetrievalParams {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            neighbor_window: config.neighbor_window,
            alpha: config.alpha,
            mmr_lambda: config.mmr_lambda,
            candidate_pool: config.candidate_pool,
            slack: config.slack,
        }
    }

    /// Upper bound on the number of passages returned.
    pub fn max_results(&self) -> usize {
        self.top_k.saturating_add(self.slack)
    }
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self::from_config(&RetrievalConfig::default())
    }
}

/// Anything that can rank an index's chunks for a question.
///
/// Results are best first with 1-based ranks. An empty index yields no
/// results rather than an error.
pub trait Retriever: Send + Sync {
    fn retrieve(
        &self,
        index: &Index,
        question: &str,
        params: &RetrievalParams,
    ) -> impl Future<Output = Result<Vec<ScoredChunk>, DocentError>> + Send;
}

/// Semantic + keyword fusion with MMR and neighbor expansion.
///
/// # Examples
///
/// ```no_run
/// use docent_core::EmbeddingConfig;
/// use docent_index::embedding::{Embedder, EmbeddingClient};
/// use docent_index::store::Index;
/// use docent_retrieve::retriever::{HybridRetriever, RetrievalParams, Retriever};
///
/// # async fn example() {
/// let config = EmbeddingConfig::default();
/// let client = EmbeddingClient::with_config(&config).unwrap();
/// let retriever = HybridRetriever::new(Embedder::from_config(client, &config));
/// let index = Index::load(std::path::Path::new(".docent/index.json")).unwrap();
/// let hits = retriever
///     .retrieve(&index, "how do I reset my VPN token?", &RetrievalParams::default())
///     .await
///     .unwrap();
/// # }
/// ```
#[derive(Debug)]
pub struct HybridRetriever<S> {
    embedder: Embedder<S>,
}

impl<S: EmbeddingService> HybridRetriever<S> {
    pub fn new(embedder: Embedder<S>) -> Self {
        Self { embedder }
    }

    pub fn embedder(&self) -> &Embedder<S> {
        &self.embedder
    }
}

impl<S: EmbeddingService> Retriever for HybridRetriever<S> {
    async fn retrieve(
        &self,
        index: &Index,
        question: &str,
        params: &RetrievalParams,
    ) -> Result<Vec<ScoredChunk>, DocentError> {
        if index.is_empty() {
            return Ok(Vec::new());
        }
        if index.model() != self.embedder.model() {
            return Err(DocentError::Config(format!(
                "index was built with embedding model {} but {} is configured; rebuild the index or change embedding.model",
                index.model(),
                self.embedder.model()
            )));
        }

        let query_vector = self.embedder.embed_one(question).await?;
        if query_vector.len() != index.dim() {
            return Err(DocentError::IndexIntegrity(format!(
                "query vector has dimension {}, index has {}",
                query_vector.len(),
                index.dim()
            )));
        }

        Ok(rank_with_query_vector(index, question, &query_vector, params))
    }
}

/// The deterministic ranking core of [`HybridRetriever`], given an already
/// normalized query vector of the index's dimension.
///
/// Ties in fused score are broken by position in the index.
///
/// # Examples
///
/// ```
/// use docent_core::Chunk;
/// use docent_index::store::Index;
/// use docent_retrieve::retriever::{rank_with_query_vector, RetrievalParams};
///
/// let chunks: Vec<Chunk> = (0..3)
///     .map(|i| Chunk {
///         id: format!("c{i}"),
///         source_name: "a.md".into(),
///         source_path: "/docs/a.md".into(),
///         section: None,
///         text: format!("passage {i}"),
///         order: i,
///     })
///     .collect();
/// let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.6, 0.8]];
/// let index = Index::new("m", chunks, vectors, "/docs").unwrap();
///
/// let params = RetrievalParams { top_k: 1, neighbor_window: 0, ..RetrievalParams::default() };
/// let hits = rank_with_query_vector(&index, "passage", &[0.0, 1.0], &params);
/// assert_eq!(hits[0].chunk.id, "c1");
/// assert_eq!(hits[0].rank, 1);
/// ```
pub fn rank_with_query_vector(
    index: &Index,
    question: &str,
    query_vector: &[f32],
    params: &RetrievalParams,
) -> Vec<ScoredChunk> {
    let chunks = index.chunks();
    let vectors = index.vectors();
    if chunks.is_empty() || params.top_k == 0 {
        return Vec::new();
    }

    let lowered: Vec<String> = chunks.iter().map(|c| c.text.to_lowercase()).collect();
    let idf = IdfTable::build(lowered.iter().map(String::as_str));
    let query_tokens = distinct_tokens(question);

    let fused: Vec<f64> = vectors
        .iter()
        .zip(&lowered)
        .map(|(vector, text)| {
            let semantic = mmr::dot(query_vector, vector);
            let keyword = normalize_keyword_score(idf.keyword_score(&query_tokens, text));
            params.alpha * semantic + (1.0 - params.alpha) * keyword
        })
        .collect();

    let mut candidates: Vec<usize> = (0..chunks.len()).collect();
    sort_by_score(&mut candidates, &fused);
    candidates.truncate(params.candidate_pool.max(params.top_k));

    let selected = mmr::select(
        &candidates,
        &fused,
        vectors,
        params.top_k,
        params.mmr_lambda,
    );

    let mut included: Vec<(usize, bool)> = selected.iter().map(|&i| (i, false)).collect();
    let mut seen: HashSet<usize> = selected.iter().copied().collect();
    if params.neighbor_window > 0 {
        let mut by_document: HashMap<&str, BTreeMap<usize, usize>> = HashMap::new();
        for (i, c) in chunks.iter().enumerate() {
            by_document
                .entry(c.source_path.as_str())
                .or_default()
                .insert(c.order, i);
        }

        // range() visits only existing orders, whatever the window
        for &i in &selected {
            let chunk = &chunks[i];
            let Some(orders) = by_document.get(chunk.source_path.as_str()) else {
                continue;
            };
            let low = chunk.order.saturating_sub(params.neighbor_window);
            let high = chunk.order.saturating_add(params.neighbor_window);
            for (_, &j) in orders.range(low..=high) {
                if seen.insert(j) {
                    included.push((j, true));
                }
            }
        }
    }

    included.sort_by(|a, b| fused[b.0].total_cmp(&fused[a.0]).then(a.0.cmp(&b.0)));
    included.truncate(params.max_results());

    tracing::debug!(
        chunks = chunks.len(),
        candidates = candidates.len(),
        selected = selected.len(),
        returned = included.len(),
        "ranked"
    );

    included
        .into_iter()
        .enumerate()
        .map(|(pos, (i, neighbor))| ScoredChunk {
            chunk: chunks[i].clone(),
            score: fused[i],
            rank: pos + 1,
            neighbor,
        })
        .collect()
}

/// Best first; equal scores keep index order.
fn sort_by_score(indices: &mut [usize], scores: &[f64]) {
    indices.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
}

/// The retriever selected by `retrieval.strategy`.
#[derive(Debug)]
pub enum RetrieverStrategy<S> {
    Hybrid(HybridRetriever<S>),
    Subprocess(SubprocessRetriever),
}

impl<S: EmbeddingService> RetrieverStrategy<S> {
    /// Build the configured strategy. `service` is only called for the
    /// hybrid retriever, so a subprocess setup needs no embedding credentials.
    ///
    /// # Errors
    ///
    /// Returns [`DocentError::Config`] if the subprocess strategy is chosen
    /// without a command, or the error of `service`.
    pub fn from_config<F>(config: &DocentConfig, service: F) -> Result<Self, DocentError>
    where
        F: FnOnce() -> Result<S, DocentError>,
    {
        match config.retrieval.strategy {
            RetrievalStrategy::Hybrid => Ok(Self::Hybrid(HybridRetriever::new(
                Embedder::from_config(service()?, &config.embedding),
            ))),
            RetrievalStrategy::Subprocess => {
                let sub = config
                    .retrieval
                    .subprocess
                    .as_ref()
                    .filter(|s| !s.command.is_empty())
                    .ok_or_else(|| {
                        DocentError::Config(
                            "retrieval.strategy = \"subprocess\" requires retrieval.subprocess.command".into(),
                        )
                    })?;
                Ok(Self::Subprocess(SubprocessRetriever::from_config(sub)))
            }
        }
    }
}

impl<S: EmbeddingService> Retriever for RetrieverStrategy<S> {
    async fn retrieve(
        &self,
        index: &Index,
        question: &str,
        params: &RetrievalParams,
    ) -> Result<Vec<ScoredChunk>, DocentError> {
        match self {
            Self::Hybrid(r) => r.retrieve(index, question, params).await,
            Self::Subprocess(r) => r.retrieve(index, question, params).await,
        }
    }
}
