use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DocentError;

/// Top-level configuration loaded from `.docent.toml`.
///
/// Resolution order is CLI flags > config file > defaults. The object is
/// passed explicitly into the builder and retriever; nothing here touches
/// process-wide state.
///
/// # Examples
///
/// ```
/// use docent_core::DocentConfig;
///
/// let config = DocentConfig::default();
/// assert_eq!(config.chunking.target_chars, 1200);
/// assert_eq!(config.retrieval.alpha, 0.7);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocentConfig {
    /// Document discovery and extraction.
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Chunker sizing.
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Embedding provider settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Ranking parameters.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Prompt context budget.
    #[serde(default)]
    pub context: ContextConfig,
    /// Generation provider settings.
    #[serde(default)]
    pub llm: LlmConfig,
}

impl DocentConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DocentError::Io`] if the file cannot be read,
    /// [`DocentError::Toml`] if the content is not valid TOML, or
    /// [`DocentError::Config`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, DocentError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`DocentError::Toml`] if parsing fails, or
    /// [`DocentError::Config`] if validation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use docent_core::DocentConfig;
    ///
    /// let toml = r#"
    /// [retrieval]
    /// top_k = 4
    /// "#;
    /// let config = DocentConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.retrieval.top_k, 4);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, DocentError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`DocentError::Config`] describing the first violation.
    pub fn validate(&self) -> Result<(), DocentError> {
        let r = &self.retrieval;
        if !(0.0..=1.0).contains(&r.alpha) {
            return Err(DocentError::Config(format!(
                "retrieval.alpha must be within [0, 1], got {}",
                r.alpha
            )));
        }
        if !(0.0..=1.0).contains(&r.mmr_lambda) {
            return Err(DocentError::Config(format!(
                "retrieval.mmr_lambda must be within [0, 1], got {}",
                r.mmr_lambda
            )));
        }
        if r.top_k == 0 {
            return Err(DocentError::Config("retrieval.top_k must be at least 1".into()));
        }
        if r.strategy == RetrievalStrategy::Subprocess
            && r.subprocess
                .as_ref()
                .map_or(true, |s| s.command.is_empty())
        {
            return Err(DocentError::Config(
                "retrieval.strategy = \"subprocess\" requires [retrieval.subprocess] command".into(),
            ));
        }

        let c = &self.chunking;
        if c.target_chars == 0 || c.overlap_chars >= c.target_chars {
            return Err(DocentError::Config(format!(
                "chunking.overlap_chars ({}) must be smaller than chunking.target_chars ({})",
                c.overlap_chars, c.target_chars
            )));
        }

        let e = &self.embedding;
        if e.batch_size == 0 {
            return Err(DocentError::Config("embedding.batch_size must be at least 1".into()));
        }
        if e.max_attempts == 0 {
            return Err(DocentError::Config(
                "embedding.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Where documents come from and how they are read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Directory scanned by `docent build` (default: `docs`).
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,
    /// Index file written by the builder and read by queries.
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
    /// Glob patterns, relative to `docs_dir`, that are never indexed.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Upper bound for extracting a single document.
    #[serde(default = "default_extract_timeout_secs")]
    pub extract_timeout_secs: u64,
    /// Command used for PDF text extraction; `{path}` is substituted.
    #[serde(default = "default_pdf_command")]
    pub pdf_command: Vec<String>,
}

fn default_docs_dir() -> PathBuf {
    PathBuf::from("docs")
}

fn default_index_path() -> PathBuf {
    PathBuf::from(".docent/index.json")
}

fn default_extract_timeout_secs() -> u64 {
    60
}

fn default_pdf_command() -> Vec<String> {
    ["pdftotext", "-layout", "{path}", "-"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            docs_dir: default_docs_dir(),
            index_path: default_index_path(),
            exclude: Vec::new(),
            extract_timeout_secs: default_extract_timeout_secs(),
            pdf_command: default_pdf_command(),
        }
    }
}

/// Chunker sizing.
///
/// # Examples
///
/// ```
/// use docent_core::ChunkingConfig;
///
/// let config = ChunkingConfig::default();
/// assert_eq!(config.overlap_chars, 200);
/// assert_eq!(config.min_chars, 40);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Preferred chunk size in characters.
    #[serde(default = "default_target_chars")]
    pub target_chars: usize,
    /// Characters carried from the end of one chunk into the next.
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
    /// Chunks shorter than this (after trimming) are dropped.
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
}

fn default_target_chars() -> usize {
    1200
}

fn default_overlap_chars() -> usize {
    200
}

fn default_min_chars() -> usize {
    40
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_chars: default_target_chars(),
            overlap_chars: default_overlap_chars(),
            min_chars: default_min_chars(),
        }
    }
}

/// Configuration for the embedding provider.
///
/// # Examples
///
/// ```
/// use docent_core::EmbeddingConfig;
///
/// let config = EmbeddingConfig::default();
/// assert_eq!(config.model, "text-embedding-3-small");
/// assert_eq!(config.batch_size, 32);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding provider (default: `"openai"`).
    #[serde(default)]
    pub provider: Provider,
    /// Model name; recorded in the index and checked at query time.
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// API key for the embedding provider.
    pub api_key: Option<String>,
    /// Custom base URL for an OpenAI-compatible endpoint.
    pub base_url: Option<String>,
    /// Texts per request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Attempts per batch, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff before the first retry; doubles on every further attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Per-request timeout.
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

fn default_batch_size() -> usize {
    32
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_embedding_timeout_secs() -> u64 {
    60
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: default_embedding_model(),
            api_key: None,
            base_url: None,
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

/// An OpenAI-compatible service that serves embeddings or completions.
///
/// The provider decides where the API key comes from when none is
/// configured and which endpoint is used when `base_url` is unset.
///
/// # Examples
///
/// ```
/// use docent_core::Provider;
///
/// assert_eq!(Provider::OpenAi.api_key_env(), Some("OPENAI_API_KEY"));
/// assert_eq!(Provider::Ollama.api_key_env(), None);
/// assert_eq!(Provider::Ollama.to_string(), "ollama");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAi,
    /// Local Ollama server; needs no key.
    Ollama,
}

impl Provider {
    /// Environment variable holding the API key, if the provider needs one.
    pub fn api_key_env(self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("OPENAI_API_KEY"),
            Provider::Ollama => None,
        }
    }

    /// Endpoint used when no `base_url` is configured.
    pub fn default_base_url(self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com",
            Provider::Ollama => "http://localhost:11434",
        }
    }

    /// Configured key, or the provider's environment variable.
    pub fn resolve_api_key(self, configured: Option<&str>) -> Option<String> {
        configured
            .map(str::to_string)
            .or_else(|| self.api_key_env().and_then(|var| std::env::var(var).ok()))
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Provider::OpenAi => "openai",
            Provider::Ollama => "ollama",
        })
    }
}

/// Which retriever implementation answers queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalStrategy {
    /// Semantic + keyword fusion, MMR, neighbor expansion.
    #[default]
    Hybrid,
    /// Delegate ranking to an external process.
    Subprocess,
}

/// External retriever process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubprocessConfig {
    /// Program and arguments.
    pub command: Vec<String>,
    /// Upper bound for one invocation.
    #[serde(default = "default_subprocess_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_subprocess_timeout_secs() -> u64 {
    30
}

/// Ranking parameters.
///
/// # Examples
///
/// ```
/// use docent_core::RetrievalConfig;
///
/// let config = RetrievalConfig::default();
/// assert_eq!(config.top_k, 6);
/// assert_eq!(config.mmr_lambda, 0.6);
/// assert_eq!(config.candidate_pool, 40);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub strategy: RetrievalStrategy,
    /// Passages picked by MMR before neighbor expansion.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// How many chunks on each side of a hit are pulled in.
    #[serde(default = "default_neighbor_window")]
    pub neighbor_window: usize,
    /// Weight of semantic similarity against keyword overlap.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Relevance/diversity trade-off for MMR.
    #[serde(default = "default_mmr_lambda")]
    pub mmr_lambda: f64,
    /// Best-scoring chunks considered by MMR.
    #[serde(default = "default_candidate_pool")]
    pub candidate_pool: usize,
    /// Extra results allowed on top of `top_k` after neighbor expansion.
    #[serde(default = "default_slack")]
    pub slack: usize,
    pub subprocess: Option<SubprocessConfig>,
}

fn default_top_k() -> usize {
    6
}

fn default_neighbor_window() -> usize {
    1
}

fn default_alpha() -> f64 {
    0.7
}

fn default_mmr_lambda() -> f64 {
    0.6
}

fn default_candidate_pool() -> usize {
    40
}

fn default_slack() -> usize {
    2
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            strategy: RetrievalStrategy::default(),
            top_k: default_top_k(),
            neighbor_window: default_neighbor_window(),
            alpha: default_alpha(),
            mmr_lambda: default_mmr_lambda(),
            candidate_pool: default_candidate_pool(),
            slack: default_slack(),
            subprocess: None,
        }
    }
}

/// Unit the context budget is measured in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetUnit {
    #[default]
    Chars,
    /// Estimated as characters / 4, rounded up.
    Tokens,
}

/// Prompt context budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Maximum size of the rendered context, in `unit`.
    #[serde(default = "default_budget")]
    pub budget: usize,
    #[serde(default)]
    pub unit: BudgetUnit,
    /// An overflowing passage is truncated only if at least this many
    /// characters of budget remain; otherwise it is dropped.
    #[serde(default = "default_min_truncate_chars")]
    pub min_truncate_chars: usize,
}

fn default_budget() -> usize {
    12_000
}

fn default_min_truncate_chars() -> usize {
    200
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            budget: default_budget(),
            unit: BudgetUnit::default(),
            min_truncate_chars: default_min_truncate_chars(),
        }
    }
}

/// LLM provider configuration.
///
/// # Examples
///
/// ```
/// use docent_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.model, "gpt-4o-mini");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Generation provider (default: `"openai"`).
    #[serde(default)]
    pub provider: Provider,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key for the provider.
    pub api_key: Option<String>,
    /// Custom base URL for API requests.
    pub base_url: Option<String>,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Per-request timeout.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_temperature() -> f64 {
    0.1
}

fn default_llm_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: default_model(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}
