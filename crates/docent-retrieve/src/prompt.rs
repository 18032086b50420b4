use docent_core::ScoredChunk;

const SYSTEM_PROMPT: &str = "\
You are Docent, an assistant that answers questions about an organization's \
internal documents.

Rules:
- Answer only from the passages in the provided context
- Cite the passages you used by their bracketed source label, e.g. [handbook.pdf > Leave]
- If the context does not contain the answer, say that you don't know
- Do not invent policies, numbers, dates, or names
- Keep answers short and direct; quote exact figures where the passages give them";

/// Reply used when retrieval found nothing to ground an answer on.
pub const NO_ANSWER: &str =
    "I don't know. None of the indexed documents appear to cover this question.";

/// Build the system prompt for grounded answering.
///
/// # Examples
///
/// ```
/// use docent_retrieve::prompt::build_system_prompt;
///
/// let prompt = build_system_prompt();
/// assert!(prompt.contains("Docent"));
/// assert!(prompt.contains("don't know"));
/// ```
pub fn build_system_prompt() -> String {
    SYSTEM_PROMPT.to_string()
}

/// Build the user prompt: the assembled context followed by the question.
///
/// # Examples
///
/// ```
/// use docent_retrieve::prompt::build_answer_prompt;
///
/// let prompt = build_answer_prompt("When is payday?", "[pay.md]\nPayday is the 25th.");
/// assert!(prompt.contains("Payday is the 25th."));
/// assert!(prompt.ends_with("When is payday?\n"));
/// ```
pub fn build_answer_prompt(question: &str, context: &str) -> String {
    format!("Context:\n\n{context}\n\n===\n\nQuestion: {question}\n")
}

/// Distinct source labels of `hits`, in rank order.
///
/// # Examples
///
/// ```
/// use docent_core::{Chunk, ScoredChunk};
/// use docent_retrieve::prompt::cited_sources;
///
/// let hit = |order: usize, section: Option<&str>| ScoredChunk {
///     chunk: Chunk {
///         id: format!("c{order}"),
///         source_name: "faq.md".into(),
///         source_path: "/docs/faq.md".into(),
///         section: section.map(str::to_string),
///         text: "...".into(),
///         order,
///     },
///     score: 0.5,
///     rank: order + 1,
///     neighbor: false,
/// };
/// let sources = cited_sources(&[hit(0, Some("VPN")), hit(1, Some("VPN")), hit(2, None)]);
/// assert_eq!(sources, vec!["faq.md > VPN", "faq.md"]);
/// ```
pub fn cited_sources(hits: &[ScoredChunk]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for hit in hits {
        let label = hit.chunk.label();
        if !sources.contains(&label) {
            sources.push(label);
        }
    }
    sources
}
