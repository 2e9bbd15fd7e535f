//! Multi-pass text chunking engine.
//!
//! Splits one document's markdown into retrieval-sized chunks in four fixed
//! passes:
//!
//! 1. structural split on markdown headers ([`split`]);
//! 2. embedding-distance resplit of oversized segments ([`semantic`]),
//!    optionally fanned out across a bounded worker pool;
//! 3. tiny/small adjacent-segment merging;
//! 4. positional metadata finalization.
//!
//! [`MarkdownChunker`] drives the passes; [`ChunkingConfig`] bounds sizes and
//! parallelism. Size semantics are asymmetric on purpose: the oversized test
//! in pass 2 counts characters, the tiny/small merge triggers in pass 3 count
//! words.

pub mod chunk;
pub mod config;
pub mod engine;
pub mod semantic;
pub mod split;

pub use chunk::{Chunk, ChunkMetadata};
pub use config::{ChunkingConfig, ChunkingStats};
pub use engine::MarkdownChunker;
