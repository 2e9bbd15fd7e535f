//! PDF parser backed by a remote markdown extraction service.
//!
//! The service receives the raw PDF bytes and returns one markdown document
//! per page. An API key is mandatory; without one the factory leaves PDF
//! support unregistered.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::errors::IngestError;
use crate::parsers::{extract_markdown_title, ParseResult, Parser, ParsingSettings};

const DEFAULT_API_URL: &str = "https://api.cloud.llamaindex.ai/api/v1/parsing/parse";
const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Deserialize)]
struct ExtractionResponse {
    pages: Vec<ExtractionPage>,
}

#[derive(Deserialize)]
struct ExtractionPage {
    markdown: String,
}

/// Parser for local `.pdf` files.
#[derive(Debug)]
pub struct PdfParser {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl PdfParser {
    /// # Errors
    ///
    /// [`IngestError::Configuration`] when no API key is configured.
    pub fn from_settings(settings: &ParsingSettings) -> Result<Self, IngestError> {
        let api_key = settings.pdf_api_key.clone().ok_or_else(|| {
            IngestError::Configuration(
                "PDF extraction API key required; set PDF_PARSER_API_KEY".into(),
            )
        })?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_url: settings
                .pdf_api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key,
        })
    }
}

#[async_trait]
impl Parser for PdfParser {
    fn can_parse(&self, source: &str) -> bool {
        source.to_lowercase().ends_with(".pdf")
    }

    async fn parse(&self, source: &str) -> Result<ParseResult, IngestError> {
        if !Path::new(source).is_file() {
            return Err(IngestError::Parsing(format!("PDF file not found: {source}")));
        }

        info!(source, "extracting PDF");
        let bytes = tokio::fs::read(source).await?;

        let response: ExtractionResponse = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/pdf")
            .timeout(EXTRACTION_TIMEOUT)
            .body(bytes)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let page_count = response.pages.len();
        let content = response
            .pages
            .into_iter()
            .map(|p| p.markdown)
            .collect::<Vec<_>>()
            .join("\n");

        if content.trim().is_empty() {
            return Err(IngestError::Parsing(format!(
                "PDF parsing resulted in empty content: {source}"
            )));
        }

        let title = extract_markdown_title(&content);
        info!(source, page_count, "PDF parsed");

        Ok(ParseResult {
            content,
            title,
            metadata: json!({
                "source_file": source,
                "page_count": page_count,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with_key() -> ParsingSettings {
        ParsingSettings {
            pdf_api_url: None,
            pdf_api_key: Some("test-key".into()),
        }
    }

    #[test]
    fn construction_requires_api_key() {
        let err = PdfParser::from_settings(&ParsingSettings::default()).unwrap_err();
        assert!(matches!(err, IngestError::Configuration(_)));
        assert!(PdfParser::from_settings(&settings_with_key()).is_ok());
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let parser = PdfParser::from_settings(&settings_with_key()).unwrap();
        assert!(parser.can_parse("report.pdf"));
        assert!(parser.can_parse("REPORT.PDF"));
        assert!(!parser.can_parse("https://example.com/page"));
    }

    #[tokio::test]
    async fn missing_file_is_a_parsing_error() {
        let parser = PdfParser::from_settings(&settings_with_key()).unwrap();
        let err = parser.parse("/nonexistent/report.pdf").await.unwrap_err();
        assert!(matches!(err, IngestError::Parsing(_)));
    }
}
