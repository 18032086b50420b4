//! Turning a directory of documents into section-aware passages.
//!
//! Enumerates supported files with the `ignore` crate, extracts their text
//! (plain text, DOCX/PPTX via `zip` + `quick-xml`, PDF via an external
//! command), and splits the text into overlapping chunks that carry their
//! nearest heading trail.

pub mod chunker;
pub mod extract;
pub mod walker;
