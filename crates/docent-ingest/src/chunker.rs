//! Section-aware chunking of extracted document text.
//!
//! Lines are grouped into blocks at heading boundaries, each block tagged with
//! a heading trail (a sliding window over the three most recent headings, not
//! a real outline). Blocks are then bundled up to a target size, and each new
//! chunk is seeded with the tail of the previous one so neighbouring chunks
//! share some text.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::LazyLock;

use docent_core::{Chunk, ChunkingConfig};
use regex::Regex;
use sha2::{Digest, Sha256};

/// Number of headings kept in a section trail.
const MAX_TRAIL_DEPTH: usize = 3;

/// Blocks longer than `target * OVERSIZE_FACTOR` are split on their own.
const OVERSIZE_FACTOR: f64 = 1.5;

const BLOCK_SEPARATOR: &str = "\n\n";

static MARKDOWN_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s+\S").expect("markdown heading regex"));

static NUMBERED_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(?:\.\d+)*\.?\s+\p{L}").expect("numbered heading regex"));

#[derive(Debug, Clone, PartialEq)]
struct Block {
    text: String,
    section: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct Piece {
    text: String,
    section: Option<String>,
}

/// Split a document's text into ordered chunks.
///
/// Empty input yields no chunks. Chunks whose trimmed text is shorter than
/// `config.min_chars` are discarded before `order` is assigned, so orders
/// are always contiguous from zero.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use docent_core::ChunkingConfig;
/// use docent_ingest::chunker::chunk_document;
///
/// let text = "# Travel\n\nBook flights through the travel portal at least two weeks ahead.";
/// let chunks = chunk_document(text, Path::new("/docs/travel.md"), &ChunkingConfig::default());
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].section.as_deref(), Some("Travel"));
/// assert_eq!(chunks[0].source_name, "travel.md");
/// assert_eq!(chunks[0].order, 0);
/// ```
pub fn chunk_document(raw: &str, source_path: &Path, config: &ChunkingConfig) -> Vec<Chunk> {
    let blocks = split_blocks(raw);
    let pieces = bundle_blocks(&blocks, config.target_chars, config.overlap_chars);

    let source_path_str = source_path.to_string_lossy().into_owned();
    let source_name = source_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_path_str.clone());
    let path_fingerprint = fingerprint(&source_path_str, 12);
    let min_chars = config.min_chars.max(1);

    pieces
        .into_iter()
        .filter(|p| p.text.chars().count() >= min_chars)
        .enumerate()
        .map(|(order, piece)| Chunk {
            id: format!("{path_fingerprint}:{order}:{}", fingerprint(&piece.text, 8)),
            source_name: source_name.clone(),
            source_path: source_path_str.clone(),
            section: piece.section,
            text: piece.text,
            order,
        })
        .collect()
}

/// Heuristic heading detection.
///
/// A line is a heading if it is a markdown heading, an ALL-CAPS line with at
/// least four alphanumeric characters, a line ending in a colon, or a
/// numbered heading such as `2.1 Scope`.
///
/// # Examples
///
/// ```
/// use docent_ingest::chunker::is_heading;
///
/// assert!(is_heading("## Installation"));
/// assert!(is_heading("SAFETY NOTICE"));
/// assert!(is_heading("Requirements:"));
/// assert!(is_heading("3.2 Network layout"));
/// assert!(!is_heading("Plug in the router."));
/// ```
pub fn is_heading(line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return false;
    }
    MARKDOWN_HEADING.is_match(line)
        || is_all_caps(line)
        || line.ends_with(':')
        || NUMBERED_HEADING.is_match(line)
}

fn is_all_caps(line: &str) -> bool {
    let alnum = line.chars().filter(|c| c.is_alphanumeric()).count();
    alnum >= 4
        && line.chars().any(|c| c.is_uppercase())
        && !line.chars().any(|c| c.is_lowercase())
}

/// Heading text without markdown markers or a trailing colon.
fn clean_heading(line: &str) -> String {
    line.trim()
        .trim_start_matches('#')
        .trim_end_matches('#')
        .trim()
        .trim_end_matches(':')
        .trim()
        .to_string()
}

fn trail_label(trail: &VecDeque<String>) -> Option<String> {
    if trail.is_empty() {
        None
    } else {
        Some(trail.iter().cloned().collect::<Vec<_>>().join(" > "))
    }
}

/// Group lines into blocks delimited by headings.
///
/// A heading flushes the running block and opens the next one; its cleaned
/// text becomes the first line of that block so it stays searchable.
fn split_blocks(raw: &str) -> Vec<Block> {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");

    let mut blocks = Vec::new();
    let mut trail: VecDeque<String> = VecDeque::with_capacity(MAX_TRAIL_DEPTH + 1);
    let mut current = String::new();
    let mut section: Option<String> = None;

    for line in normalized.lines() {
        if is_heading(line) {
            flush_block(&mut blocks, &mut current, section.take());

            let heading = clean_heading(line);
            if heading.is_empty() {
                continue;
            }
            trail.push_back(heading.clone());
            if trail.len() > MAX_TRAIL_DEPTH {
                trail.pop_front();
            }
            section = trail_label(&trail);
            current.push_str(&heading);
        } else {
            if current.is_empty() {
                section = trail_label(&trail);
            } else {
                current.push('\n');
            }
            current.push_str(line.trim_end());
        }
    }
    flush_block(&mut blocks, &mut current, section);

    blocks
}

fn flush_block(blocks: &mut Vec<Block>, current: &mut String, section: Option<String>) {
    let text = current.trim();
    if !text.is_empty() {
        blocks.push(Block {
            text: text.to_string(),
            section,
        });
    }
    current.clear();
}

/// Bundle blocks into pieces of roughly `target` characters.
///
/// A piece is labelled with the section of its first block. After a piece is
/// emitted, the next one starts with the trailing `overlap` characters of it.
fn bundle_blocks(blocks: &[Block], target: usize, overlap: usize) -> Vec<Piece> {
    let oversize = (target as f64 * OVERSIZE_FACTOR) as usize;

    let mut pieces: Vec<Piece> = Vec::new();
    let mut buf = String::new();
    let mut buf_len = 0usize;
    let mut section: Option<String> = None;
    let mut has_block = false;

    for block in blocks {
        let block_len = block.text.chars().count();

        if block_len > oversize {
            if has_block {
                pieces.push(Piece {
                    text: buf.trim().to_string(),
                    section: section.take(),
                });
            }
            for part in split_oversized(&block.text, target, overlap) {
                pieces.push(Piece {
                    text: part,
                    section: block.section.clone(),
                });
            }
            buf = pieces
                .last()
                .map(|p| tail_chars(&p.text, overlap).to_string())
                .unwrap_or_default();
            buf_len = buf.chars().count();
            has_block = false;
            continue;
        }

        let sep_len = if buf.is_empty() { 0 } else { BLOCK_SEPARATOR.len() };
        if has_block && buf_len + sep_len + block_len > target {
            let emitted = buf.trim().to_string();
            buf = tail_chars(&emitted, overlap).to_string();
            buf_len = buf.chars().count();
            pieces.push(Piece {
                text: emitted,
                section: section.take(),
            });
            has_block = false;
        }

        if !has_block {
            section = block.section.clone();
        }
        if !buf.is_empty() {
            buf.push_str(BLOCK_SEPARATOR);
            buf_len += BLOCK_SEPARATOR.len();
        }
        buf.push_str(&block.text);
        buf_len += block_len;
        has_block = true;
    }

    if has_block {
        pieces.push(Piece {
            text: buf.trim().to_string(),
            section,
        });
    }
    pieces
}

/// Greedy line accumulation for a single oversized block. Lines longer than
/// `target` are cut into `target`-sized segments first.
fn split_oversized(text: &str, target: usize, overlap: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    let mut fresh = false;

    for line in text.lines() {
        for segment in hard_wrap(line, target) {
            let segment_len = segment.chars().count();
            if fresh && current_len + 1 + segment_len > target {
                let emitted = current.trim().to_string();
                current = tail_chars(&emitted, overlap).to_string();
                current_len = current.chars().count();
                parts.push(emitted);
                fresh = false;
            }
            if !current.is_empty() {
                current.push('\n');
                current_len += 1;
            }
            current.push_str(segment);
            current_len += segment_len;
            fresh = true;
        }
    }

    if fresh {
        let rest = current.trim();
        if !rest.is_empty() {
            parts.push(rest.to_string());
        }
    }
    parts
}

fn hard_wrap(line: &str, width: usize) -> Vec<&str> {
    if width == 0 || line.chars().count() <= width {
        return vec![line];
    }
    let mut segments = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (i, _) in line.char_indices() {
        if count == width {
            segments.push(&line[start..i]);
            start = i;
            count = 0;
        }
        count += 1;
    }
    segments.push(&line[start..]);
    segments
}

/// The last `n` characters of `s` (all of `s` if shorter).
fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((i, _)) => &s[i..],
        None => s,
    }
}

fn fingerprint(content: &str, len: usize) -> String {
    let digest = format!("{:x}", Sha256::digest(content.as_bytes()));
    digest[..len].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn config(target: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            target_chars: target,
            overlap_chars: overlap,
            min_chars: 40,
        }
    }

    fn paragraph(seed: usize, len: usize) -> String {
        let words = [
            "router", "firmware", "backup", "schedule", "policy", "device", "network", "access",
        ];
        let mut out = String::new();
        let mut i = seed;
        while out.len() < len {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(words[i % words.len()]);
            i += 3;
        }
        out.push('.');
        out
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_document("", Path::new("/d/a.txt"), &config(1200, 200)).is_empty());
        assert!(chunk_document("\n\n  \n", Path::new("/d/a.txt"), &config(1200, 200)).is_empty());
    }

    #[test]
    fn heading_detection_rules() {
        assert!(is_heading("# Title"));
        assert!(is_heading("###### Deep"));
        assert!(is_heading("OVERVIEW"));
        assert!(is_heading("  FAQ 2024  "));
        assert!(is_heading("Before you begin:"));
        assert!(is_heading("1 Introduction"));
        assert!(is_heading("4.2.1. Firewall rules"));

        assert!(!is_heading(""));
        assert!(!is_heading("#hashtag"));
        assert!(!is_heading("ABC"));
        assert!(!is_heading("2024"));
        assert!(!is_heading("Regular sentence with words."));
    }

    #[test]
    fn clean_heading_strips_markers() {
        assert_eq!(clean_heading("## Setup ##"), "Setup");
        assert_eq!(clean_heading("Requirements:"), "Requirements");
        assert_eq!(clean_heading("  SAFETY  "), "SAFETY");
    }

    #[test]
    fn document_without_headings_is_one_untitled_block() {
        let text = format!("{}\n{}", paragraph(0, 200), paragraph(1, 200));
        let chunks = chunk_document(&text, Path::new("/docs/plain.txt"), &config(1200, 200));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section, None);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn trail_is_a_sliding_window_of_three() {
        let body = paragraph(0, 60);
        let text = format!("# A\n{body}\n## B\n{body}\n### C\n{body}\n#### D\n{body}\n");
        let blocks = split_blocks(&text);
        let sections: Vec<Option<&str>> = blocks.iter().map(|b| b.section.as_deref()).collect();
        assert_eq!(
            sections,
            vec![Some("A"), Some("A > B"), Some("A > B > C"), Some("B > C > D")]
        );
        assert!(blocks[3].text.starts_with("D\n"));
    }

    #[test]
    fn text_before_first_heading_has_no_section() {
        let text = format!("{}\n# Later\n{}", paragraph(0, 80), paragraph(1, 80));
        let blocks = split_blocks(&text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].section, None);
        assert_eq!(blocks[1].section.as_deref(), Some("Later"));
    }

    #[test]
    fn crlf_line_endings_are_normalized() {
        let text = "# Title\r\nfirst line of the body text here\r\nsecond line of the body text";
        let blocks = split_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert!(!blocks[0].text.contains('\r'));
    }

    #[test]
    fn bundle_takes_first_blocks_section() {
        let blocks = vec![
            Block {
                text: "a".repeat(100),
                section: Some("One".into()),
            },
            Block {
                text: "b".repeat(100),
                section: Some("Two".into()),
            },
        ];
        let pieces = bundle_blocks(&blocks, 1200, 200);
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].section.as_deref(), Some("One"));
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        let sections: Vec<String> = (0..12)
            .map(|i| format!("## Part {i}\n{}", paragraph(i, 350)))
            .collect();
        let text = sections.join("\n");
        let chunks = chunk_document(&text, Path::new("/docs/long.md"), &config(1200, 200));
        assert!(chunks.len() >= 3);

        for pair in chunks.windows(2) {
            let tail = tail_chars(&pair[0].text, 200).trim_start();
            assert!(!tail.is_empty());
            assert!(
                pair[1].text.starts_with(tail),
                "chunk {} does not start with the tail of chunk {}",
                pair[1].order,
                pair[0].order
            );
        }
    }

    #[test]
    fn zero_overlap_produces_disjoint_chunks() {
        let sections: Vec<String> = (0..6)
            .map(|i| format!("## Part {i}\n{}", paragraph(i, 500)))
            .collect();
        let chunks = chunk_document(&sections.join("\n"), Path::new("/d/x.md"), &config(1200, 0));
        assert!(chunks.len() >= 2);
        assert!(chunks[1].text.starts_with("Part"));
    }

    #[test]
    fn oversized_block_is_sub_split() {
        let text = paragraph(0, 5000);
        let chunks = chunk_document(&text, Path::new("/docs/wall.txt"), &config(1000, 100));
        assert!(chunks.len() >= 5);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 1000 + 100 + 1);
        }
    }

    #[test]
    fn oversized_block_split_on_lines() {
        let lines: Vec<String> = (0..40).map(|i| paragraph(i, 90)).collect();
        let text = lines.join("\n");
        let chunks = chunk_document(&text, Path::new("/docs/log.txt"), &config(500, 50));
        assert!(chunks.len() > 1);
        for line in &lines {
            assert!(chunks.iter().any(|c| c.text.contains(line.as_str())));
        }
    }

    #[test]
    fn tiny_fragments_are_dropped() {
        let chunks = chunk_document("# Hi\nok", Path::new("/docs/tiny.md"), &config(1200, 200));
        assert!(chunks.is_empty());
    }

    #[test]
    fn orders_are_contiguous_and_ids_unique() {
        let sections: Vec<String> = (0..10)
            .map(|i| format!("## Part {i}\n{}", paragraph(i, 400)))
            .collect();
        let chunks = chunk_document(&sections.join("\n"), Path::new("/d/m.md"), &config(800, 100));
        let orders: Vec<usize> = chunks.iter().map(|c| c.order).collect();
        assert_eq!(orders, (0..chunks.len()).collect::<Vec<_>>());

        let ids: HashSet<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), chunks.len());
    }

    #[test]
    fn ids_are_stable_across_runs() {
        let text = format!("# Intro\n{}", paragraph(3, 300));
        let first = chunk_document(&text, Path::new("/d/s.md"), &config(1200, 200));
        let second = chunk_document(&text, Path::new("/d/s.md"), &config(1200, 200));
        assert_eq!(first, second);

        let elsewhere = chunk_document(&text, Path::new("/d/other.md"), &config(1200, 200));
        assert_ne!(first[0].id, elsewhere[0].id);
    }

    #[test]
    fn every_body_line_is_covered() {
        let mut text = String::new();
        let mut body_lines = Vec::new();
        for i in 0..8 {
            text.push_str(&format!("## Section {i}\n"));
            for j in 0..4 {
                let line = paragraph(i * 4 + j, 120);
                text.push_str(&line);
                text.push('\n');
                body_lines.push(line);
            }
        }
        let chunks = chunk_document(&text, Path::new("/d/cover.md"), &config(700, 100));
        for line in &body_lines {
            assert!(
                chunks.iter().any(|c| c.text.contains(line.as_str())),
                "line lost: {line}"
            );
        }
    }

    #[test]
    fn markdown_scenario_two_sections() {
        let mut text = String::from("## Overview\n\n");
        for i in 0..5 {
            text.push_str(&paragraph(i, 300));
            text.push_str("\n\n");
        }
        text.push_str("## Details\n\n");
        for i in 5..10 {
            text.push_str(&paragraph(i, 300));
            text.push_str("\n\n");
        }
        assert!(text.len() >= 2900);

        let chunks = chunk_document(&text, Path::new("/docs/guide.md"), &config(1200, 200));
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 1800 + 200 + 2);
        }
        let tail = tail_chars(&chunks[0].text, 200).trim_start();
        assert!(chunks[1].text.starts_with(tail));
        assert_eq!(chunks[0].section.as_deref(), Some("Overview"));
    }

    #[test]
    fn tail_chars_respects_char_boundaries() {
        assert_eq!(tail_chars("héllo wörld", 5), "wörld");
        assert_eq!(tail_chars("abc", 10), "abc");
        assert_eq!(tail_chars("abc", 0), "");
    }

    #[test]
    fn hard_wrap_splits_long_lines() {
        let segments = hard_wrap("abcdefghij", 4);
        assert_eq!(segments, vec!["abcd", "efgh", "ij"]);
    }
}
