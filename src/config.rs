//! Environment-driven configuration.
//!
//! [`Settings::from_env`] loads a `.env` file when present and reads the
//! variables below, falling back to defaults. Validation happens eagerly so a
//! misconfigured process fails before any stage runs.
//!
//! Recognized variables:
//!
//! | Variable                 | Purpose                                  |
//! |--------------------------|------------------------------------------|
//! | `DB_URL` / `DATABASE_URL`| SQLite database path                     |
//! | `EMBEDDING_API_KEY`      | Embedding endpoint API key               |
//! | `EMBEDDING_API_URL`      | Embedding endpoint override              |
//! | `EMBEDDING_MODEL`        | Document embedding model                 |
//! | `EMBEDDING_BATCH_SIZE`   | Vector-store submission batch size       |
//! | `PDF_PARSER_API_KEY`     | PDF extraction service key (optional)    |
//! | `PDF_PARSER_API_URL`     | PDF extraction endpoint override         |
//! | `CHUNK_MAX_SIZE` etc.    | Chunking knobs (see [`ChunkingConfig`])  |

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chunking::ChunkingConfig;
use crate::embedding::EmbeddingSettings;
use crate::errors::IngestError;
use crate::parsers::ParsingSettings;

/// Relational storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Path of the SQLite database file.
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "docsmith.db".to_string(),
        }
    }
}

/// Full process configuration, grouped per concern.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub embedding: EmbeddingSettings,
    pub parsing: ParsingSettings,
    pub chunking: ChunkingConfig,
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>, IngestError>
where
    T::Err: std::fmt::Display,
{
    var(name)
        .map(|raw| {
            raw.parse::<T>().map_err(|err| {
                IngestError::Configuration(format!("invalid value for {name} ('{raw}'): {err}"))
            })
        })
        .transpose()
}

impl Settings {
    /// Loads settings from the environment (and `.env`, if present) and
    /// validates them.
    ///
    /// # Errors
    ///
    /// [`IngestError::Configuration`] on unparseable values or cross-field
    /// violations.
    pub fn from_env() -> Result<Self, IngestError> {
        // A missing .env file is not an error.
        if dotenvy::dotenv().is_ok() {
            debug!(".env file loaded");
        }

        let mut settings = Settings::default();

        if let Some(url) = var("DB_URL").or_else(|| var("DATABASE_URL")) {
            settings.database.url = url;
        }

        settings.embedding.api_key = var("EMBEDDING_API_KEY");
        if let Some(url) = var("EMBEDDING_API_URL") {
            settings.embedding.api_url = url;
        }
        if let Some(model) = var("EMBEDDING_MODEL") {
            settings.embedding.model = model;
        }
        if let Some(batch) = parse_var::<usize>("EMBEDDING_BATCH_SIZE")? {
            settings.embedding.batch_size = batch;
        }

        settings.parsing.pdf_api_key = var("PDF_PARSER_API_KEY");
        settings.parsing.pdf_api_url = var("PDF_PARSER_API_URL");

        if let Some(v) = parse_var::<usize>("CHUNK_MAX_SIZE")? {
            settings.chunking.max_size = v;
        }
        if let Some(v) = parse_var::<usize>("CHUNK_MIN_SIZE")? {
            settings.chunking.min_size = v;
        }
        if let Some(v) = parse_var::<usize>("CHUNK_MAX_HEADER_LEVEL")? {
            settings.chunking.max_header_level = v;
        }
        if let Some(v) = parse_var::<bool>("CHUNK_ENABLE_SEMANTIC")? {
            settings.chunking.enable_semantic = v;
        }
        if let Some(v) = parse_var::<bool>("CHUNK_ENABLE_PARALLEL")? {
            settings.chunking.enable_parallel = v;
        }
        if let Some(v) = parse_var::<usize>("CHUNK_MAX_WORKERS")? {
            settings.chunking.max_workers = v;
        }
        if let Some(v) = parse_var::<usize>("CHUNK_TINY_THRESHOLD")? {
            settings.chunking.tiny_chunk_threshold = v;
        }
        if let Some(model) = var("CHUNK_EMBEDDING_MODEL") {
            settings.chunking.model = model;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Cross-field validation applied by [`Settings::from_env`]; call
    /// directly when building settings by hand.
    pub fn validate(&self) -> Result<(), IngestError> {
        self.chunking.validate()?;
        if self.embedding.batch_size == 0 {
            return Err(IngestError::Configuration(
                "embedding batch_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut settings = Settings::default();
        settings.embedding.batch_size = 0;
        assert!(matches!(
            settings.validate(),
            Err(IngestError::Configuration(_))
        ));
    }

    #[test]
    fn chunking_cross_field_rule_applies() {
        let mut settings = Settings::default();
        settings.chunking.max_size = 100;
        settings.chunking.min_size = 700;
        assert!(settings.validate().is_err());
    }
}
