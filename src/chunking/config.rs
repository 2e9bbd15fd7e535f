//! Chunker configuration and run statistics.

use serde::{Deserialize, Serialize};

use crate::errors::IngestError;

/// Immutable configuration for one chunking run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters; segments above this are resplit.
    pub max_size: usize,
    /// Minimum chunk size; segments below this (in words) get merged forward.
    pub min_size: usize,
    /// Deepest markdown header level (1-6) to split on.
    pub max_header_level: usize,
    /// Enable the embedding-distance resplit pass.
    pub enable_semantic: bool,
    /// Run the resplit pass across a bounded worker pool.
    pub enable_parallel: bool,
    /// Worker pool size for parallel resplitting.
    pub max_workers: usize,
    /// Word count below which a segment is unconditionally merged forward.
    pub tiny_chunk_threshold: usize,
    /// Embedding model identifier, used as the resource cache key.
    pub model: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_size: 2000,
            min_size: 700,
            max_header_level: 6,
            enable_semantic: true,
            enable_parallel: true,
            max_workers: 4,
            tiny_chunk_threshold: 50,
            model: "bge-small-en-v1.5".to_string(),
        }
    }
}

impl ChunkingConfig {
    /// Validates cross-field constraints.
    ///
    /// # Errors
    ///
    /// [`IngestError::Configuration`] when `max_size <= min_size` or
    /// `max_header_level` is outside 1-6.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_size <= self.min_size {
            return Err(IngestError::Configuration(format!(
                "max_size ({}) must be greater than min_size ({})",
                self.max_size, self.min_size
            )));
        }
        if self.max_header_level == 0 || self.max_header_level > 6 {
            return Err(IngestError::Configuration(format!(
                "max_header_level must be between 1 and 6, got {}",
                self.max_header_level
            )));
        }
        Ok(())
    }
}

/// Summary statistics for one chunking run.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ChunkingStats {
    pub total_chunks: usize,
    /// Wall-clock processing time in seconds.
    pub processing_time: f64,
    /// Mean chunk size in words.
    pub avg_chunk_size: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ChunkingConfig::default().validate().is_ok());
    }

    #[test]
    fn max_size_must_exceed_min_size() {
        let config = ChunkingConfig {
            max_size: 500,
            min_size: 700,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(IngestError::Configuration(_))
        ));
    }

    #[test]
    fn header_level_bounds() {
        let config = ChunkingConfig {
            max_header_level: 7,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
