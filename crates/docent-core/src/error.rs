use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Errors that can occur across docent.
///
/// Each variant maps onto one [`ErrorKind`], naming the subsystem that
/// failed. Library crates use this type directly; the binary converts it to
/// a `miette::Report` at the boundary.
///
/// # Examples
///
/// ```
/// use docent_core::DocentError;
///
/// let err = DocentError::Config("missing API key".into());
/// assert!(err.to_string().contains("missing API key"));
/// assert!(!err.is_transient());
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum DocentError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    #[diagnostic(code(docent::io))]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(code(docent::config), help("check .docent.toml and the command-line flags"))]
    Config(String),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    #[diagnostic(code(docent::not_found))]
    FileNotFound(PathBuf),

    /// A single document could not be turned into text.
    #[error("could not extract text from {}: {message}", path.display())]
    #[diagnostic(code(docent::extraction))]
    Extraction {
        /// Document that failed.
        path: PathBuf,
        /// Reader-specific failure description.
        message: String,
    },

    /// The embedding or generation service asked us to slow down (HTTP 429).
    #[error("rate limited: {0}")]
    #[diagnostic(code(docent::rate_limited))]
    RateLimited(String),

    /// The remote service failed on its side (HTTP 5xx).
    #[error("service unavailable: {0}")]
    #[diagnostic(code(docent::service_unavailable))]
    ServiceUnavailable(String),

    /// An embedding request did not finish in time.
    #[error("timed out: {0}")]
    #[diagnostic(code(docent::timeout))]
    Timeout(String),

    /// Non-retriable embedding failure, or retries exhausted.
    #[error("embedding error: {0}")]
    #[diagnostic(code(docent::embedding))]
    Embedding(String),

    /// The index file violates its schema invariants.
    #[error("index integrity error: {0}")]
    #[diagnostic(
        code(docent::index_integrity),
        help("rebuild the index with `docent build`")
    )]
    IndexIntegrity(String),

    /// Nothing to index: no supported files, or no chunk survived filtering.
    #[error("empty corpus: {0}")]
    #[diagnostic(
        code(docent::empty_corpus),
        help("supported extensions are pdf, docx, pptx, txt, md and csv")
    )]
    EmptyCorpus(String),

    /// LLM API or response error.
    #[error("LLM error: {0}")]
    #[diagnostic(code(docent::llm))]
    Llm(String),

    /// External retrieval process failure.
    #[error("subprocess error: {0}")]
    #[diagnostic(code(docent::subprocess))]
    Subprocess(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    #[diagnostic(code(docent::serialization))]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(docent::toml))]
    Toml(#[from] toml::de::Error),
}

/// Coarse failure class, stable enough to hand to API callers.
///
/// # Examples
///
/// ```
/// use docent_core::ErrorKind;
///
/// assert_eq!(serde_json::to_string(&ErrorKind::IndexIntegrity).unwrap(), "\"index_integrity\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Extraction,
    Embedding,
    IndexIntegrity,
    EmptyCorpus,
    Generation,
    Subprocess,
    Io,
}

impl DocentError {
    /// Whether a retry with backoff may succeed.
    ///
    /// Rate limiting, server-side failures and timeouts are transient;
    /// everything else is fatal.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DocentError::RateLimited(_) | DocentError::ServiceUnavailable(_) | DocentError::Timeout(_)
        )
    }

    /// Classify this error for structured reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocentError::Config(_) | DocentError::FileNotFound(_) | DocentError::Toml(_) => {
                ErrorKind::Configuration
            }
            DocentError::Extraction { .. } => ErrorKind::Extraction,
            DocentError::RateLimited(_)
            | DocentError::ServiceUnavailable(_)
            | DocentError::Timeout(_)
            | DocentError::Embedding(_) => ErrorKind::Embedding,
            DocentError::IndexIntegrity(_) | DocentError::Serialization(_) => {
                ErrorKind::IndexIntegrity
            }
            DocentError::EmptyCorpus(_) => ErrorKind::EmptyCorpus,
            DocentError::Llm(_) => ErrorKind::Generation,
            DocentError::Subprocess(_) => ErrorKind::Subprocess,
            DocentError::Io(_) => ErrorKind::Io,
        }
    }
}
