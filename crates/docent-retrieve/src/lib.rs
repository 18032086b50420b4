//! Query-time half of docent: ranking, context assembly, and generation.
//!
//! - [`retriever`]: the [`retriever::Retriever`] trait, hybrid semantic +
//!   keyword ranking, and configuration-selected strategies
//! - [`lexical`]: corpus IDF table and keyword scoring
//! - [`mmr`]: Maximal Marginal Relevance selection
//! - [`subprocess`]: retrieval delegated to an external process
//! - [`context`]: budgeted prompt context with citations
//! - [`llm`], [`prompt`]: grounded answer generation
//! - [`pipeline`]: retrieve + assemble (+ answer) entry points

pub mod context;
pub mod lexical;
pub mod llm;
pub mod mmr;
pub mod pipeline;
pub mod prompt;
pub mod retriever;
pub mod subprocess;
