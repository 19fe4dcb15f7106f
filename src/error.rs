//! Defines the custom error types for the email-scrape application.

use std::io;
use std::time::Duration;
use thiserror::Error;
use url::ParseError as UrlParseError;

/// The primary error type for the crawl-and-extract pipeline.
#[derive(Error, Debug)]
pub(crate) enum AppError {
    /// Error occurring during configuration loading or validation.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// Error related to file input/output operations.
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    /// Error during JSON serialization or deserialization.
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error reading or writing CSV files.
    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),

    /// Error parsing a URL.
    #[error("URL Parsing Error: {0}")]
    UrlParse(#[from] UrlParseError),

    /// Error making HTTP requests via reqwest.
    #[error("HTTP Request Error: {0}")]
    Request(#[from] reqwest::Error),

    /// The headless browser itself is unusable (launch failure, lost CDP connection).
    #[error("Browser Error: {0}")]
    Browser(String),

    /// An input token could not be turned into a URL with a host.
    #[error("Invalid Input: {0}")]
    InvalidInput(String),

    /// A page failed to load or its content could not be read.
    #[error("Navigation Error for {url}: {reason}")]
    Navigation {
        /// The URL that was being loaded.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// A page did not finish loading within the configured timeout.
    #[error("Navigation Timeout for {url} after {timeout:?}")]
    NavigationTimeout {
        /// The URL that was being loaded.
        url: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// A structured-data block could not be parsed.
    #[error("Structured Data Parse Error: {0}")]
    Parse(String),

    /// The enrichment provider failed or returned something unusable.
    #[error("Enrichment Error: {0}")]
    Enrichment(String),

    /// The result store could not be read or written.
    #[error("Persistence Error: {0}")]
    Persistence(String),

    /// An underlying error that doesn't fit other categories, using anyhow.
    #[error("Generic Error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl AppError {
    /// Whether this error must abort the whole run rather than a single domain.
    ///
    /// Only a broken browser engine or a store that can no longer be written
    /// qualify; everything else is contained inside per-domain processing.
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(self, AppError::Browser(_) | AppError::Persistence(_))
    }

    pub(crate) fn navigation(url: impl Into<String>, reason: impl ToString) -> Self {
        AppError::Navigation {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(err.to_string())
    }
}

pub(crate) type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(AppError::Browser("connection closed".into()).is_fatal());
        assert!(AppError::Persistence("disk full".into()).is_fatal());
        assert!(!AppError::navigation("https://a.com", "net::ERR_NAME_NOT_RESOLVED").is_fatal());
        assert!(
            !AppError::NavigationTimeout {
                url: "https://a.com".into(),
                timeout: Duration::from_secs(1)
            }
            .is_fatal()
        );
        assert!(!AppError::Enrichment("bad json".into()).is_fatal());
        assert!(!AppError::InvalidInput("".into()).is_fatal());
    }
}
