//! Retrieval delegated to an external program.
//!
//! The program receives one JSON request on stdin:
//!
//! ```text
//! {"question": "...", "top_k": 6, "neighbor_window": 1, "docs_dir": "...", "model": "..."}
//! ```
//!
//! and answers on stdout with either `[{"id": "...", "score": 0.8}, ...]` or
//! `{"hits": [...]}`, ids referring to chunks of the index. Anything that is
//! not such JSON is taken verbatim as a single passage.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use docent_core::{Chunk, DocentError, ScoredChunk, SubprocessConfig};
use docent_index::store::Index;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::retriever::{RetrievalParams, Retriever};

/// Runs a configured command per query and maps its answer onto the index.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use docent_retrieve::subprocess::SubprocessRetriever;
///
/// let retriever = SubprocessRetriever::new(
///     vec!["python3".into(), "rank.py".into()],
///     Duration::from_secs(30),
/// );
/// assert_eq!(retriever.command()[0], "python3");
/// ```
#[derive(Debug, Clone)]
pub struct SubprocessRetriever {
    command: Vec<String>,
    timeout: Duration,
}

#[derive(Serialize)]
struct SubprocessRequest<'a> {
    question: &'a str,
    top_k: usize,
    neighbor_window: usize,
    docs_dir: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SubprocessReply {
    Hits(Vec<SubprocessHit>),
    Wrapped { hits: Vec<SubprocessHit> },
}

#[derive(Deserialize)]
struct SubprocessHit {
    id: String,
    #[serde(default)]
    score: f64,
}

impl SubprocessRetriever {
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        Self { command, timeout }
    }

    pub fn from_config(config: &SubprocessConfig) -> Self {
        Self::new(config.command.clone(), Duration::from_secs(config.timeout_secs))
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    async fn run(&self, input: &[u8]) -> Result<String, DocentError> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(DocentError::Config(
                "retrieval.subprocess.command is empty".into(),
            ));
        };

        let mut child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DocentError::Subprocess(format!("failed to start {program}: {e}")))?;

        let stdin = child.stdin.take();
        let exchange = async move {
            if let Some(mut stdin) = stdin {
                // a program that ignores its input may close stdin early
                if let Err(e) = stdin.write_all(input).await {
                    tracing::debug!(error = %e, "subprocess closed stdin");
                }
            }
            child.wait_with_output().await
        };

        // Dropping the exchange on timeout kills the child.
        let output = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                DocentError::Subprocess(format!(
                    "{program} did not finish within {}s",
                    self.timeout.as_secs_f64()
                ))
            })?
            .map_err(|e| DocentError::Subprocess(format!("{program}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DocentError::Subprocess(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Retriever for SubprocessRetriever {
    async fn retrieve(
        &self,
        index: &Index,
        question: &str,
        params: &RetrievalParams,
    ) -> Result<Vec<ScoredChunk>, DocentError> {
        let request = SubprocessRequest {
            question,
            top_k: params.top_k,
            neighbor_window: params.neighbor_window,
            docs_dir: index.docs_dir(),
            model: index.model(),
        };
        let input = serde_json::to_vec(&request)?;
        let stdout = self.run(&input).await?;
        let hits = parse_reply(&stdout, index, params.top_k + params.slack, &self.command);
        tracing::debug!(hits = hits.len(), "subprocess retrieval finished");
        Ok(hits)
    }
}

/// Interpret the program's stdout. Unknown ids are skipped.
fn parse_reply(stdout: &str, index: &Index, limit: usize, command: &[String]) -> Vec<ScoredChunk> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let hits = match serde_json::from_str::<SubprocessReply>(trimmed) {
        Ok(SubprocessReply::Hits(hits)) | Ok(SubprocessReply::Wrapped { hits }) => hits,
        Err(_) => return vec![plain_text_passage(trimmed, command)],
    };

    let by_id: HashMap<&str, &Chunk> = index.chunks().iter().map(|c| (c.id.as_str(), c)).collect();
    hits.into_iter()
        .filter_map(|hit| match by_id.get(hit.id.as_str()) {
            Some(chunk) => Some(((*chunk).clone(), hit.score)),
            None => {
                tracing::warn!(id = %hit.id, "subprocess returned an id not in the index");
                None
            }
        })
        .take(limit)
        .enumerate()
        .map(|(i, (chunk, score))| ScoredChunk {
            chunk,
            score,
            rank: i + 1,
            neighbor: false,
        })
        .collect()
}

fn plain_text_passage(text: &str, command: &[String]) -> ScoredChunk {
    let program = command.first().map(String::as_str).unwrap_or("subprocess");
    let name = std::path::Path::new(program)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string());
    ScoredChunk {
        chunk: Chunk {
            id: "subprocess:0".into(),
            source_name: name,
            source_path: program.to_string(),
            section: None,
            text: text.to_string(),
            order: 0,
        },
        score: 1.0,
        rank: 1,
        neighbor: false,
    }
}
