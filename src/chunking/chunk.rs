//! Chunk records and their structured metadata.

use serde::{Deserialize, Serialize};

/// Number of markdown header levels tracked (H1-H6).
pub const HEADER_LEVELS: usize = 6;

/// A retrieval-sized text segment with structural/positional metadata.
///
/// Lifecycle: created by the structural splitter, possibly replaced (1→N) by
/// the resplitter, possibly merged (N→1) by the combiner, finalized once with
/// positional metadata. After finalization the chunk list is immutable
/// output of the engine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(text: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// Word count, split on whitespace. Pass-3 merge rules key on this.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    /// Character count. The pass-2 oversized test keys on this.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Structured metadata attached to a chunk.
///
/// `headers[i]` holds the nearest enclosing header at level `i + 1`. The
/// remaining fields are written once by the finalize pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub headers: [Option<String>; HEADER_LEVELS],
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_combined: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_semantic_split: bool,
    pub chunk_index: Option<usize>,
    pub doc_title: Option<String>,
    pub word_count: Option<usize>,
    pub char_count: Option<usize>,
    pub primary_header: Option<String>,
    pub header_level: Option<usize>,
    pub section_path: Option<String>,
}

impl ChunkMetadata {
    /// Header at the given 1-based level, if set.
    pub fn header(&self, level: usize) -> Option<&str> {
        self.headers
            .get(level.checked_sub(1)?)
            .and_then(|h| h.as_deref())
    }

    /// Sets the header at the given 1-based level.
    pub fn set_header(&mut self, level: usize, value: impl Into<String>) {
        if (1..=HEADER_LEVELS).contains(&level) {
            self.headers[level - 1] = Some(value.into());
        }
    }

    /// Headers present, shallowest first.
    pub fn header_trail(&self) -> Vec<&str> {
        self.headers.iter().flatten().map(String::as_str).collect()
    }

    /// Merges metadata when combining two adjacent segments.
    ///
    /// Non-header fields come from the first segment; a header level is
    /// retained only when both segments agree on its value. A dropped level
    /// signals that the merged chunk spans a header boundary.
    pub fn merged_with(&self, other: &ChunkMetadata) -> ChunkMetadata {
        let mut merged = self.clone();
        for level in 0..HEADER_LEVELS {
            if merged.headers[level] != other.headers[level] {
                merged.headers[level] = None;
            }
        }
        merged
    }
}
