//! The four built-in pipeline stages.
//!
//! Each stage is idempotent, declares its dependencies by name, and encodes
//! domain failures into the context with `mark_stage_failed` so the
//! orchestrator can continue past them.

pub mod chunk;
pub mod embed;
pub mod parse;
pub mod persist;

pub use chunk::ChunkingStage;
pub use embed::EmbeddingStage;
pub use parse::ParsingStage;
pub use persist::PersistenceStage;

/// Stage names, used both as dependency labels and status keys.
pub const PARSING: &str = "parsing";
pub const CHUNKING: &str = "chunking";
pub const EMBEDDING: &str = "embedding";
pub const PERSISTENCE: &str = "persistence";
