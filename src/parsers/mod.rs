//! Source parsers turning URLs and PDF files into markdown.
//!
//! Each parser implements [`Parser`]; [`ParserFactory`] selects the first one
//! whose `can_parse` accepts the source. Parsers are independent of the
//! pipeline and return a plain [`ParseResult`].

pub mod pdf;
pub mod url;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::IngestError;

pub use pdf::PdfParser;
pub use url::UrlParser;

/// Output of a successful parse.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParseResult {
    /// Markdown rendition of the source.
    pub content: String,
    /// Document title, when one could be extracted.
    pub title: Option<String>,
    /// Parser-specific details (source URL, content type, page count).
    pub metadata: serde_json::Value,
}

/// A strategy for turning one kind of source locator into markdown.
#[async_trait]
pub trait Parser: Send + Sync + std::fmt::Debug {
    /// Whether this parser handles the given source locator.
    fn can_parse(&self, source: &str) -> bool;

    /// Fetches and converts the source.
    async fn parse(&self, source: &str) -> Result<ParseResult, IngestError>;
}

/// Configuration for the parsing layer.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ParsingSettings {
    /// Endpoint of the remote PDF extraction service.
    pub pdf_api_url: Option<String>,
    /// API key for the PDF extraction service; PDF support is disabled
    /// without one.
    pub pdf_api_key: Option<String>,
}

/// Selects a parser for a source by trying registered parsers in order.
pub struct ParserFactory {
    parsers: Vec<Box<dyn Parser>>,
}

impl ParserFactory {
    /// Builds the factory from settings. The URL parser is always available;
    /// the PDF parser is registered only when an API key is configured.
    pub fn new(settings: &ParsingSettings) -> Self {
        let mut parsers: Vec<Box<dyn Parser>> = vec![Box::new(UrlParser::new())];

        match PdfParser::from_settings(settings) {
            Ok(parser) => parsers.push(Box::new(parser)),
            Err(err) => warn!(error = %err, "PDF parser not available"),
        }

        Self { parsers }
    }

    /// # Errors
    ///
    /// [`IngestError::Parsing`] when no registered parser handles `source`.
    pub fn get_parser(&self, source: &str) -> Result<&dyn Parser, IngestError> {
        for parser in &self.parsers {
            if parser.can_parse(source) {
                return Ok(parser.as_ref());
            }
        }
        Err(IngestError::Parsing(format!(
            "no parser available for source: {source}; supported types are \
             HTTP/HTTPS URLs and PDF files (.pdf)"
        )))
    }

    /// Selects a parser and parses the source in one call.
    pub async fn parse(&self, source: &str) -> Result<ParseResult, IngestError> {
        let parser = self.get_parser(source)?;
        debug!(source, "parser selected");
        parser.parse(source).await
    }
}

/// Extracts the document title from the first H1 in the first 20 lines.
pub(crate) fn extract_markdown_title(markdown: &str) -> Option<String> {
    for line in markdown.lines().take(20) {
        if let Some(rest) = line.trim().strip_prefix("# ") {
            let title = rest.trim();
            if !title.is_empty() {
                return Some(title.to_string());
            }
        }
    }
    None
}
