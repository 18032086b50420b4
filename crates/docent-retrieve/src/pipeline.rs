use docent_core::{DocentError, QueryOutcome, RetrievalFailure};
use docent_index::cache::IndexCache;
use docent_index::store::Index;
use serde::Serialize;

use crate::context::ContextAssembler;
use crate::llm::{ChatMessage, CompletionService};
use crate::prompt;
use crate::retriever::{RetrievalParams, Retriever};

/// A generated answer and the sources it was grounded on.
///
/// # Examples
///
/// ```
/// use docent_retrieve::pipeline::Answer;
///
/// let answer = Answer {
///     answer: "Twenty days.".into(),
///     sources: vec!["leave.md > Annual leave".into()],
///     grounded: true,
/// };
/// let json = serde_json::to_value(&answer).unwrap();
/// assert_eq!(json["sources"][0], "leave.md > Annual leave");
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub answer: String,
    /// Distinct citation labels of the passages handed to the model.
    pub sources: Vec<String>,
    /// `false` when nothing was retrieved and the model was not called.
    pub grounded: bool,
}

/// Retrieve + assemble: the query-side entry point.
///
/// Failures come back as a [`RetrievalFailure`] (kind and message) so
/// callers can render them instead of aborting.
pub struct QueryPipeline<R> {
    retriever: R,
    params: RetrievalParams,
    assembler: ContextAssembler,
}

impl<R: Retriever> QueryPipeline<R> {
    pub fn new(retriever: R, params: RetrievalParams, assembler: ContextAssembler) -> Self {
        Self {
            retriever,
            params,
            assembler,
        }
    }

    pub fn params(&self) -> &RetrievalParams {
        &self.params
    }

    /// Rank `index` for `question` and render the budgeted context.
    ///
    /// A blank question, an empty index, or no hits give an empty outcome.
    ///
    /// # Errors
    ///
    /// Embedding, subprocess, and integrity failures of the retriever.
    pub async fn query(&self, index: &Index, question: &str) -> Result<QueryOutcome, RetrievalFailure> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(QueryOutcome {
                context: String::new(),
                hits: Vec::new(),
            });
        }

        let hits = self
            .retriever
            .retrieve(index, question, &self.params)
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "retrieval failed");
                RetrievalFailure::from(err)
            })?;
        let context = self.assembler.assemble(&hits);
        tracing::debug!(hits = hits.len(), context_chars = context.chars().count(), "query assembled");

        Ok(QueryOutcome { context, hits })
    }

    /// [`QueryPipeline::query`] against the index held by `cache`, loading
    /// it on first use.
    ///
    /// # Errors
    ///
    /// Also fails if the index file is missing or does not validate.
    pub async fn query_path(
        &self,
        cache: &IndexCache,
        question: &str,
    ) -> Result<QueryOutcome, RetrievalFailure> {
        let index = cache.get().map_err(RetrievalFailure::from)?;
        self.query(&index, question).await
    }
}

/// Ask `llm` to answer `question` from `outcome`'s context.
///
/// With no hits the model is not called and a fixed "don't know" reply is
/// returned.
///
/// # Errors
///
/// Returns the generation service's error.
pub async fn answer<C: CompletionService>(
    llm: &C,
    outcome: &QueryOutcome,
    question: &str,
) -> Result<Answer, DocentError> {
    if outcome.hits.is_empty() || outcome.context.trim().is_empty() {
        return Ok(Answer {
            answer: prompt::NO_ANSWER.to_string(),
            sources: Vec::new(),
            grounded: false,
        });
    }

    let messages = vec![
        ChatMessage::system(prompt::build_system_prompt()),
        ChatMessage::user(prompt::build_answer_prompt(question, &outcome.context)),
    ];
    tracing::debug!(model = llm.model(), hits = outcome.hits.len(), "generating answer");
    let reply = llm.complete(messages).await?;

    Ok(Answer {
        answer: reply.trim().to_string(),
        sources: prompt::cited_sources(&outcome.hits),
        grounded: true,
    })
}
