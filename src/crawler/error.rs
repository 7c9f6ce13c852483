//! Error types for the crawler module

use thiserror::Error;

/// Error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status {
        /// URL that was requested
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// HTML parsing error
    #[error("HTML parsing error: {0}")]
    HtmlParse(String),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// The seed URL cannot be crawled
    #[error("Invalid seed URL: {0}")]
    InvalidSeed(String),
}

impl CrawlError {
    /// Whether this error is a network or server failure rather than bad input
    pub fn is_transport(&self) -> bool {
        match self {
            CrawlError::Http(_) => true,
            CrawlError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
