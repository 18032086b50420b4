//! Text extraction collaborators.
//!
//! An empty string means "no extractable text" and is not an error; the
//! builder decides what to do with it.

use std::future::Future;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use docent_core::{DocentError, IngestConfig};
use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use crate::walker::{DocumentFile, DocumentKind};

/// Turns one document into plain text.
pub trait TextExtractor: Send + Sync {
    /// Extract the full text of `file`.
    fn extract(
        &self,
        file: &DocumentFile,
    ) -> impl Future<Output = Result<String, DocentError>> + Send;
}

/// Built-in readers for every supported format, each bounded by a timeout.
///
/// # Examples
///
/// ```
/// use docent_core::IngestConfig;
/// use docent_ingest::extract::DefaultExtractor;
///
/// let extractor = DefaultExtractor::from_config(&IngestConfig::default());
/// assert_eq!(extractor.pdf_command()[0], "pdftotext");
/// ```
#[derive(Debug, Clone)]
pub struct DefaultExtractor {
    pdf_command: Vec<String>,
    timeout: Duration,
}

impl DefaultExtractor {
    pub fn new(pdf_command: Vec<String>, timeout: Duration) -> Self {
        Self {
            pdf_command,
            timeout,
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(
            config.pdf_command.clone(),
            Duration::from_secs(config.extract_timeout_secs),
        )
    }

    pub fn pdf_command(&self) -> &[String] {
        &self.pdf_command
    }

    async fn extract_inner(&self, file: &DocumentFile) -> Result<String, String> {
        match file.kind {
            kind if kind.is_plain_text() => {
                let bytes = tokio::fs::read(&file.path)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            DocumentKind::Docx => {
                let path = file.path.clone();
                tokio::task::spawn_blocking(move || docx_text(&path))
                    .await
                    .map_err(|e| format!("reader task failed: {e}"))?
            }
            DocumentKind::Pptx => {
                let path = file.path.clone();
                tokio::task::spawn_blocking(move || pptx_text(&path))
                    .await
                    .map_err(|e| format!("reader task failed: {e}"))?
            }
            DocumentKind::Pdf => self.run_pdf_command(&file.path).await,
            _ => Err("unsupported document type".into()),
        }
    }

    async fn run_pdf_command(&self, path: &Path) -> Result<String, String> {
        let Some((program, args)) = self.pdf_command.split_first() else {
            return Err("no PDF extraction command configured".into());
        };
        let path_str = path.to_string_lossy();
        let args: Vec<String> = args.iter().map(|a| a.replace("{path}", &path_str)).collect();

        let output = tokio::process::Command::new(program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| format!("failed to run {program}: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("{program} exited with {}: {}", output.status, stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl TextExtractor for DefaultExtractor {
    async fn extract(&self, file: &DocumentFile) -> Result<String, DocentError> {
        let to_error = |message: String| DocentError::Extraction {
            path: file.path.clone(),
            message,
        };

        match tokio::time::timeout(self.timeout, self.extract_inner(file)).await {
            Ok(result) => result.map_err(to_error),
            Err(_) => Err(to_error(format!(
                "timed out after {}s",
                self.timeout.as_secs_f64()
            ))),
        }
    }
}

fn docx_text(path: &Path) -> Result<String, String> {
    let mut archive = open_archive(path)?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| format!("missing word/document.xml: {e}"))?
        .read_to_string(&mut xml)
        .map_err(|e| e.to_string())?;
    ooxml_text(&xml)
}

fn pptx_text(path: &Path) -> Result<String, String> {
    let mut archive = open_archive(path)?;

    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = name
                .strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse()
                .ok()?;
            Some((number, name.to_string()))
        })
        .collect();
    slides.sort();

    let mut pages = Vec::with_capacity(slides.len());
    for (_, name) in slides {
        let mut xml = String::new();
        archive
            .by_name(&name)
            .map_err(|e| e.to_string())?
            .read_to_string(&mut xml)
            .map_err(|e| e.to_string())?;
        let text = ooxml_text(&xml)?;
        if !text.trim().is_empty() {
            pages.push(text);
        }
    }
    Ok(pages.join("\n\n"))
}

fn open_archive(path: &Path) -> Result<ZipArchive<std::fs::File>, String> {
    let file = std::fs::File::open(path).map_err(|e| e.to_string())?;
    ZipArchive::new(file).map_err(|e| format!("not a valid OOXML container: {e}"))
}

/// Collect text runs from WordprocessingML / DrawingML, one line per
/// paragraph.
fn ooxml_text(xml: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let text = e.unescape().map_err(|e| format!("XML parse error: {e}"))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error: {e}")),
            _ => {}
        }
    }
    Ok(out)
}
