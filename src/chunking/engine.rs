//! The four-pass chunking engine.
//!
//! Pass 1 splits on markdown headers (lossless). Pass 2 resplits oversized
//! segments at semantic breakpoints, optionally across a bounded worker pool.
//! Pass 3 merges tiny and small segments forward. Pass 4 finalizes positional
//! metadata. Output order always follows the original document order.

use std::sync::Arc;
use std::time::Instant;

use futures_util::future;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::chunking::chunk::Chunk;
use crate::chunking::config::{ChunkingConfig, ChunkingStats};
use crate::chunking::semantic;
use crate::chunking::split::{extract_headers, extract_title, split_by_headers};
use crate::embedding::Embedder;
use crate::errors::IngestError;

/// Chunks one markdown document under an immutable configuration.
///
/// The embedder is optional; without one (or with `enable_semantic` off) the
/// resplit pass is skipped and oversized segments pass through unchanged.
pub struct MarkdownChunker {
    text: String,
    config: ChunkingConfig,
    title: Option<String>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl MarkdownChunker {
    /// # Errors
    ///
    /// [`IngestError::Chunking`] when `text` is empty or whitespace-only,
    /// [`IngestError::Configuration`] when the config fails validation.
    pub fn new(
        text: impl Into<String>,
        config: ChunkingConfig,
        title: Option<String>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Result<Self, IngestError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(IngestError::Chunking(
                "cannot chunk empty document".into(),
            ));
        }
        config.validate()?;
        Ok(Self {
            text,
            config,
            title,
            embedder,
        })
    }

    /// Runs all four passes, returning the final chunks and run statistics.
    pub async fn chunk(&self) -> Result<(Vec<Chunk>, ChunkingStats), IngestError> {
        let started = Instant::now();
        let title = self
            .title
            .clone()
            .or_else(|| extract_title(&self.text))
            .unwrap_or_else(|| "Untitled".to_string());

        let mut chunks = split_by_headers(&self.text, self.config.max_header_level);
        if chunks.is_empty() {
            // No newline-terminated content; treat the whole text as one segment.
            chunks = vec![Chunk::new(
                self.text.clone(),
                extract_headers(&self.text, self.config.max_header_level),
            )];
        }
        debug!(segments = chunks.len(), "structural split complete");

        if self.config.enable_semantic
            && let Some(embedder) = &self.embedder
        {
            chunks = self.resplit_oversized(chunks, embedder).await;
            debug!(segments = chunks.len(), "semantic resplit complete");
        }

        let chunks = self.merge_small(chunks);
        let chunks = self.finalize(chunks, &title);

        let total_words: usize = chunks.iter().map(Chunk::word_count).sum();
        let stats = ChunkingStats {
            total_chunks: chunks.len(),
            processing_time: started.elapsed().as_secs_f64(),
            avg_chunk_size: if chunks.is_empty() {
                0.0
            } else {
                total_words as f64 / chunks.len() as f64
            },
        };
        info!(
            chunks = stats.total_chunks,
            avg_words = format!("{:.1}", stats.avg_chunk_size),
            elapsed_s = format!("{:.3}", stats.processing_time),
            "chunking complete"
        );
        Ok((chunks, stats))
    }

    /// Pass 2: resplits segments whose character count exceeds `max_size`.
    ///
    /// Fail-soft per segment: a failed resplit keeps the original segment.
    /// Output preserves the original segment order regardless of worker
    /// completion order.
    async fn resplit_oversized(
        &self,
        segments: Vec<Chunk>,
        embedder: &Arc<dyn Embedder>,
    ) -> Vec<Chunk> {
        let max_size = self.config.max_size;

        if !self.config.enable_parallel {
            let mut out = Vec::with_capacity(segments.len());
            for segment in segments {
                out.extend(resplit_one(segment, embedder.as_ref(), max_size).await);
            }
            return out;
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_workers.max(1)));
        let tasks = segments.into_iter().map(|segment| {
            let embedder = Arc::clone(embedder);
            let semaphore = Arc::clone(&semaphore);
            async move {
                if segment.char_count() <= max_size {
                    return vec![segment];
                }
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return vec![segment],
                };
                resplit_one(segment, embedder.as_ref(), max_size).await
            }
        });

        // join_all yields results in task order, so original document order
        // survives the concurrent fan-out.
        future::join_all(tasks)
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Pass 3: merges undersized segments forward.
    ///
    /// A segment under `tiny_chunk_threshold` words is unconditionally merged
    /// with its successor. A segment under `min_size` words absorbs successors
    /// while the combined character length stays within `max_size`, stopping
    /// once the combined word count reaches `min_size`.
    fn merge_small(&self, chunks: Vec<Chunk>) -> Vec<Chunk> {
        let mut merged = Vec::with_capacity(chunks.len());
        let mut i = 0;

        while i < chunks.len() {
            let current = &chunks[i];
            let words = current.word_count();

            if words < self.config.tiny_chunk_threshold && i + 1 < chunks.len() {
                let next = &chunks[i + 1];
                let mut metadata = current.metadata.merged_with(&next.metadata);
                metadata.is_combined = true;
                merged.push(Chunk::new(
                    format!("{}\n\n{}", current.text, next.text),
                    metadata,
                ));
                i += 2;
                continue;
            }

            if words < self.config.min_size {
                let mut text = current.text.clone();
                let mut metadata = current.metadata.clone();
                let mut contributors = 1;
                let mut j = i + 1;
                while j < chunks.len() {
                    if text.split_whitespace().count() >= self.config.min_size {
                        break;
                    }
                    let next = &chunks[j];
                    if text.chars().count() + 2 + next.char_count() > self.config.max_size {
                        break;
                    }
                    text.push_str("\n\n");
                    text.push_str(&next.text);
                    metadata = metadata.merged_with(&next.metadata);
                    contributors += 1;
                    j += 1;
                }
                metadata.is_combined = contributors > 1;
                merged.push(Chunk::new(text, metadata));
                i = j;
                continue;
            }

            merged.push(current.clone());
            i += 1;
        }

        merged
    }

    /// Pass 4: writes positional metadata onto every chunk.
    fn finalize(&self, mut chunks: Vec<Chunk>, title: &str) -> Vec<Chunk> {
        for (index, chunk) in chunks.iter_mut().enumerate() {
            let word_count = chunk.word_count();
            let char_count = chunk.char_count();
            let trail: Vec<String> = chunk
                .metadata
                .header_trail()
                .into_iter()
                .map(str::to_string)
                .collect();

            let metadata = &mut chunk.metadata;
            metadata.chunk_index = Some(index);
            metadata.doc_title = Some(title.to_string());
            metadata.word_count = Some(word_count);
            metadata.char_count = Some(char_count);
            metadata.primary_header = trail.last().cloned();
            metadata.header_level = Some(trail.len());

            let path: Vec<&str> = std::iter::once(title)
                .chain(trail.iter().map(String::as_str))
                .collect();
            metadata.section_path = Some(path.join(" > "));
        }
        chunks
    }
}

async fn resplit_one(segment: Chunk, embedder: &dyn Embedder, max_size: usize) -> Vec<Chunk> {
    if segment.char_count() <= max_size {
        return vec![segment];
    }
    match semantic::resplit(&segment, embedder).await {
        Ok(pieces) => pieces,
        Err(err) => {
            warn!(
                chars = segment.char_count(),
                error = %err,
                "semantic resplit failed, keeping original segment"
            );
            vec![segment]
        }
    }
}
