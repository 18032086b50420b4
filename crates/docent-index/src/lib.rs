//! Embedding, persistence, and construction of the document index.
//!
//! - [`embedding`]: provider client and the normalizing [`embedding::Embedder`] adapter
//! - [`retry`]: exponential backoff for transient provider failures
//! - [`store`]: the persisted [`store::Index`] and its integrity checks
//! - [`builder`]: walk, extract, chunk, embed, save
//! - [`cache`]: shared read-mostly handle to a loaded index

pub mod builder;
pub mod cache;
pub mod embedding;
pub mod retry;
pub mod store;
