//! Error types for stackscrape operations.
//!
//! Only collaborator failures are errors. A page where nothing matches is an
//! empty result, not an error.

use thiserror::Error;

/// Errors that can occur while fetching pages or loading rules.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to fetch {url} after {attempts} attempts: {reason}")]
    Fetch {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("malformed rule data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid rule: {0}")]
    InvalidRule(String),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
