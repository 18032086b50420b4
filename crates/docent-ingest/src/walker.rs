use std::path::{Path, PathBuf};

use docent_core::DocentError;

/// A supported document discovered during directory walking.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use docent_ingest::walker::{DocumentFile, DocumentKind};
///
/// let file = DocumentFile {
///     path: PathBuf::from("/docs/handbook.md"),
///     kind: DocumentKind::Markdown,
/// };
/// assert_eq!(file.name(), "handbook.md");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFile {
    /// Absolute path to the document.
    pub path: PathBuf,
    /// Format detected from the extension.
    pub kind: DocumentKind,
}

impl DocumentFile {
    /// Basename used for citations.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }
}

/// Document format detected from file extension.
///
/// # Examples
///
/// ```
/// use docent_ingest::walker::DocumentKind;
///
/// assert_eq!(DocumentKind::from_extension("pdf"), DocumentKind::Pdf);
/// assert_eq!(DocumentKind::from_extension("DOCX"), DocumentKind::Docx);
/// assert_eq!(DocumentKind::from_extension("md"), DocumentKind::Markdown);
/// assert_eq!(DocumentKind::from_extension("rs"), DocumentKind::Unsupported);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Pptx,
    Text,
    Markdown,
    Csv,
    Unsupported,
}

impl DocumentKind {
    /// Detect the format from an extension string (without the dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => DocumentKind::Pdf,
            "docx" => DocumentKind::Docx,
            "pptx" => DocumentKind::Pptx,
            "txt" => DocumentKind::Text,
            "md" | "markdown" => DocumentKind::Markdown,
            "csv" => DocumentKind::Csv,
            _ => DocumentKind::Unsupported,
        }
    }

    /// Whether the file is read directly as (possibly lossy) UTF-8.
    pub fn is_plain_text(self) -> bool {
        matches!(
            self,
            DocumentKind::Text | DocumentKind::Markdown | DocumentKind::Csv
        )
    }
}

/// Walk `root`, returning every supported document in lexicographic path
/// order.
///
/// Respects `.gitignore`/`.ignore` rules and skips hidden entries. Paths
/// whose location relative to `root` matches one of the `exclude` globs are
/// left out.
///
/// # Errors
///
/// Returns [`DocentError::Config`] if `root` is missing or not a directory,
/// or if an exclude pattern is not a valid glob.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use docent_ingest::walker::walk_docs;
///
/// let files = walk_docs(Path::new("docs"), &[]).unwrap();
/// for f in &files {
///     println!("{}: {:?}", f.path.display(), f.kind);
/// }
/// ```
pub fn walk_docs(root: &Path, exclude: &[String]) -> Result<Vec<DocumentFile>, DocentError> {
    if !root.is_dir() {
        return Err(DocentError::Config(format!(
            "docs directory not found: {}",
            root.display()
        )));
    }
    let root = std::fs::canonicalize(root)?;

    let patterns = exclude
        .iter()
        .map(|p| {
            glob::Pattern::new(p)
                .map_err(|e| DocentError::Config(format!("invalid exclude pattern {p:?}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut files = Vec::new();
    for entry in ignore::WalkBuilder::new(&root).build() {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                tracing::debug!(error = %err, "skipping unreadable entry");
                continue;
            }
        };

        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }

        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        let kind = DocumentKind::from_extension(ext);
        if kind == DocumentKind::Unsupported {
            continue;
        }

        let relative = path.strip_prefix(&root).unwrap_or(path);
        if patterns.iter().any(|p| p.matches_path(relative)) {
            tracing::debug!(path = %relative.display(), "excluded by pattern");
            continue;
        }

        files.push(DocumentFile {
            path: path.to_path_buf(),
            kind,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}
