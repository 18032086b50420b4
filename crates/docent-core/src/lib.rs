//! Core types, configuration, and error handling for docent.
//!
//! This crate provides the shared foundation used by all other docent crates:
//! - [`DocentError`]: unified error type using `thiserror` and `miette`
//! - [`DocentConfig`]: configuration loaded from `.docent.toml`
//! - Shared types: [`Chunk`], [`ScoredChunk`], [`BuildStats`],
//!   [`QueryOutcome`], [`RetrievalFailure`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{
    BudgetUnit, ChunkingConfig, ContextConfig, DocentConfig, EmbeddingConfig, IngestConfig,
    LlmConfig, Provider, RetrievalConfig, RetrievalStrategy, SubprocessConfig,
};
pub use error::{DocentError, ErrorKind};
pub use types::{
    BuildStats, Chunk, OutputFormat, QueryOutcome, RetrievalFailure, ScoredChunk, SkippedFile,
};

/// A convenience `Result` type for docent operations.
pub type Result<T> = std::result::Result<T, DocentError>;
