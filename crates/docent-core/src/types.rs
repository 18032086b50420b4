use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DocentError, ErrorKind};

/// A contiguous span of text extracted from one document; the unit of
/// retrieval.
///
/// Field names are part of the index file schema and stay snake_case.
///
/// # Examples
///
/// ```
/// use docent_core::Chunk;
///
/// let chunk = Chunk {
///     id: "a1b2c3d4e5f6:0:0f9e8d7c".into(),
///     source_path: "/docs/handbook.md".into(),
///     source_name: "handbook.md".into(),
///     section: Some("Onboarding > Laptops".into()),
///     text: "Every new hire receives a laptop on day one.".into(),
///     order: 0,
/// };
/// assert_eq!(chunk.label(), "handbook.md > Onboarding > Laptops");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable identifier derived from source path, order and content.
    pub id: String,
    /// Display name (basename of `source_path`).
    pub source_name: String,
    /// Absolute path of the originating document.
    pub source_path: String,
    /// Up to three enclosing headings joined by `" > "`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Trimmed, non-empty chunk content.
    pub text: String,
    /// Zero-based position within the source document.
    pub order: usize,
}

impl Chunk {
    /// Citation label: source name, followed by the section trail if any.
    pub fn label(&self) -> String {
        match &self.section {
            Some(section) => format!("{} > {section}", self.source_name),
            None => self.source_name.clone(),
        }
    }
}

/// A chunk ranked for one query. Never persisted.
///
/// # Examples
///
/// ```
/// use docent_core::{Chunk, ScoredChunk};
///
/// let hit = ScoredChunk {
///     chunk: Chunk {
///         id: "x:1:y".into(),
///         source_path: "/docs/a.txt".into(),
///         source_name: "a.txt".into(),
///         section: None,
///         text: "hello".into(),
///         order: 1,
///     },
///     score: 0.82,
///     rank: 1,
///     neighbor: false,
/// };
/// assert_eq!(hit.rank, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Fused relevance score.
    pub score: f64,
    /// 1-based position after final ordering.
    pub rank: usize,
    /// Added by neighbor expansion rather than selected directly.
    #[serde(default)]
    pub neighbor: bool,
}

/// A document the builder did not index, and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a successful index build.
///
/// # Examples
///
/// ```
/// use docent_core::BuildStats;
///
/// let stats = BuildStats { file_count: 3, chunk_count: 41, dim: 1536, skipped: vec![] };
/// let json = serde_json::to_value(&stats).unwrap();
/// assert_eq!(json["fileCount"], 3);
/// assert_eq!(json["chunkCount"], 41);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStats {
    /// Documents that contributed at least one chunk.
    pub file_count: usize,
    /// Chunks written to the index.
    pub chunk_count: usize,
    /// Embedding dimensionality of the index.
    pub dim: usize,
    /// Supported documents left out of the index.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedFile>,
}

/// Rendered context plus the hits it was built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutcome {
    /// Budgeted prompt block with per-passage citations.
    pub context: String,
    /// Ranked passages, best first.
    pub hits: Vec<ScoredChunk>,
}

/// Structured retrieval failure handed to callers instead of a raw error.
///
/// # Examples
///
/// ```
/// use docent_core::{DocentError, ErrorKind, RetrievalFailure};
///
/// let failure = RetrievalFailure::from(&DocentError::Embedding("HTTP 401".into()));
/// assert_eq!(failure.kind, ErrorKind::Embedding);
/// assert!(failure.message.contains("401"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&DocentError> for RetrievalFailure {
    fn from(err: &DocentError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<DocentError> for RetrievalFailure {
    fn from(err: DocentError) -> Self {
        Self::from(&err)
    }
}

impl fmt::Display for RetrievalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RetrievalFailure {}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use docent_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunk(section: Option<&str>) -> Chunk {
        Chunk {
            id: "abc:0:def".into(),
            source_path: "/docs/guide.md".into(),
            source_name: "guide.md".into(),
            section: section.map(str::to_string),
            text: "Install the agent before enrolling devices.".into(),
            order: 0,
        }
    }

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "markdown".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn output_format_display() {
        assert_eq!(OutputFormat::Text.to_string(), "text");
        assert_eq!(OutputFormat::Json.to_string(), "json");
        assert_eq!(OutputFormat::Markdown.to_string(), "markdown");
    }

    #[test]
    fn chunk_uses_index_schema_field_names() {
        let json = serde_json::to_value(sample_chunk(Some("Setup"))).unwrap();
        assert!(json.get("source_name").is_some());
        assert!(json.get("source_path").is_some());
        assert_eq!(json["section"], "Setup");
        assert_eq!(json["order"], 0);
    }

    #[test]
    fn chunk_without_section_omits_field() {
        let json = serde_json::to_value(sample_chunk(None)).unwrap();
        assert!(json.get("section").is_none());

        let back: Chunk = serde_json::from_value(json).unwrap();
        assert_eq!(back.section, None);
    }

    #[test]
    fn label_appends_section_trail() {
        assert_eq!(sample_chunk(None).label(), "guide.md");
        assert_eq!(
            sample_chunk(Some("Install > Linux")).label(),
            "guide.md > Install > Linux"
        );
    }

    #[test]
    fn retrieval_failure_serializes_kind_and_message() {
        let failure = RetrievalFailure::from(DocentError::IndexIntegrity("dim mismatch".into()));
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "index_integrity");
        assert!(json["message"].as_str().unwrap().contains("dim mismatch"));
    }
}
