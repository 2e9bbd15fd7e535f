//! Pass 1: structural splitting on markdown headers.
//!
//! Splitting is lossless: every character of the input lands in exactly one
//! output segment, header lines included. Each segment carries the nearest
//! enclosing header at every level seen so far; deeper levels reset whenever
//! a shallower header appears.

use std::sync::LazyLock;

use regex::Regex;

use crate::chunking::chunk::{Chunk, ChunkMetadata, HEADER_LEVELS};

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("header regex"));

/// Parses a markdown header line, returning `(level, text)`.
pub fn parse_header(line: &str, max_level: usize) -> Option<(usize, &str)> {
    let caps = HEADER_RE.captures(line.trim_end())?;
    let level = caps.get(1)?.as_str().len();
    if level > max_level {
        return None;
    }
    let text = caps.get(2)?.as_str().trim();
    Some((level, text))
}

/// Extracts the document title from the first H1 within the first 10 lines.
pub fn extract_title(text: &str) -> Option<String> {
    for line in text.lines().take(10) {
        if let Some(caps) = HEADER_RE.captures(line.trim())
            && caps.get(1).map(|m| m.as_str().len()) == Some(1)
        {
            return caps.get(2).map(|m| m.as_str().trim().to_string());
        }
    }
    None
}

/// Extracts the trailing header context of a block of text.
///
/// The last header seen at each level wins; deeper levels reset whenever a
/// shallower header appears. Used for the single-segment fallback.
pub fn extract_headers(text: &str, max_level: usize) -> ChunkMetadata {
    let mut headers: [Option<String>; HEADER_LEVELS] = Default::default();

    for line in text.lines() {
        if let Some((level, header)) = parse_header(line, max_level) {
            headers[level - 1] = Some(header.to_string());
            for slot in headers.iter_mut().skip(level) {
                *slot = None;
            }
        }
    }

    ChunkMetadata {
        headers,
        ..Default::default()
    }
}

/// Splits `text` into header-delimited segments.
///
/// Header lines stay in the segment they open. The preamble before the first
/// header (if any) becomes its own segment with no header context.
pub fn split_by_headers(text: &str, max_level: usize) -> Vec<Chunk> {
    let mut segments = Vec::new();
    let mut current_headers: [Option<String>; HEADER_LEVELS] = Default::default();
    let mut buffer = String::new();
    let mut buffer_meta = ChunkMetadata::default();

    // split_inclusive keeps line terminators, so segment texts concatenate
    // back to the exact input.
    for line in text.split_inclusive('\n') {
        if let Some((level, header)) = parse_header(line, max_level) {
            if !buffer.is_empty() {
                segments.push(Chunk::new(std::mem::take(&mut buffer), buffer_meta));
            }
            current_headers[level - 1] = Some(header.to_string());
            for slot in current_headers.iter_mut().skip(level) {
                *slot = None;
            }
            buffer_meta = ChunkMetadata {
                headers: current_headers.clone(),
                ..Default::default()
            };
            buffer.push_str(line);
        } else {
            if buffer.is_empty() {
                buffer_meta = ChunkMetadata {
                    headers: current_headers.clone(),
                    ..Default::default()
                };
            }
            buffer.push_str(line);
        }
    }

    if !buffer.is_empty() {
        segments.push(Chunk::new(buffer, buffer_meta));
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "intro\n# One\nalpha\n## Sub\nbeta\n# Two\ngamma\n";

    #[test]
    fn split_is_lossless() {
        let segments = split_by_headers(DOC, 6);
        let rejoined: String = segments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rejoined, DOC);
    }

    #[test]
    fn headers_stay_with_their_segment() {
        let segments = split_by_headers(DOC, 6);
        assert_eq!(segments.len(), 4);
        assert!(segments[1].text.starts_with("# One"));
        assert_eq!(segments[1].metadata.header(1), Some("One"));
        assert_eq!(segments[2].metadata.header(1), Some("One"));
        assert_eq!(segments[2].metadata.header(2), Some("Sub"));
    }

    #[test]
    fn deeper_levels_reset_on_shallower_header() {
        let segments = split_by_headers(DOC, 6);
        let last = segments.last().unwrap();
        assert_eq!(last.metadata.header(1), Some("Two"));
        assert_eq!(last.metadata.header(2), None);
    }

    #[test]
    fn preamble_has_no_header_context() {
        let segments = split_by_headers(DOC, 6);
        assert_eq!(segments[0].text, "intro\n");
        assert!(segments[0].metadata.header_trail().is_empty());
    }

    #[test]
    fn max_level_limits_split_points() {
        let segments = split_by_headers(DOC, 1);
        // "## Sub" is not a split point at max_level 1.
        assert_eq!(segments.len(), 3);
    }

    #[test]
    fn title_extraction_checks_first_ten_lines() {
        assert_eq!(extract_title("x\n# The Title\n"), Some("The Title".into()));
        let pushed_down = format!("{}# Late\n", "line\n".repeat(10));
        assert_eq!(extract_title(&pushed_down), None);
    }

    #[test]
    fn extract_headers_keeps_last_per_level() {
        let meta = extract_headers(DOC, 6);
        assert_eq!(meta.header(1), Some("Two"));
        assert_eq!(meta.header(2), None);
    }
}
