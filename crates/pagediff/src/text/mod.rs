//! Text extraction side channel.

use std::time::Duration;

use log::debug;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, CONTENT_TYPE};

use crate::error::TextError;

/// Turns document bytes into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, document: &[u8]) -> Result<String, TextError>;
}

/// Settings for the HTTP extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpExtractorSettings {
    pub url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

/// Tika-style extraction service: `PUT` the PDF, read `text/plain` back.
pub struct HttpTextExtractor {
    client: HttpClient,
    url: String,
}

impl HttpTextExtractor {
    pub fn new(settings: &HttpExtractorSettings) -> Result<Self, TextError> {
        let client = HttpClient::builder()
            .timeout(settings.timeout)
            .connect_timeout(settings.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            url: settings.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl TextExtractor for HttpTextExtractor {
    fn extract_text(&self, document: &[u8]) -> Result<String, TextError> {
        debug!("Extracting text from {} bytes via {}", document.len(), self.url);

        let response = self
            .client
            .put(&self.url)
            .header(ACCEPT, "text/plain")
            .header(CONTENT_TYPE, "application/pdf")
            .body(document.to_vec())
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(TextError::Status {
                status: status.as_u16(),
            });
        }

        Ok(response.text()?)
    }
}

/// Extractor used when extraction is switched off in the config.
pub struct DisabledTextExtractor;

impl TextExtractor for DisabledTextExtractor {
    fn extract_text(&self, _document: &[u8]) -> Result<String, TextError> {
        Err(TextError::Disabled)
    }
}
