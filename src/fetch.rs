//! Page fetching.
//!
//! The engine never talks to the network itself. Callers hand it a
//! [`Source`]; URLs are resolved through a [`Fetch`] implementation, by
//! default [`HttpFetcher`], which retries a fixed number of times with a
//! fixed pause between attempts.

use std::thread::sleep;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::util::{charset_from_content_type, decode_text};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_5) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/84.0.4147.135 Safari/537.36";

/// Where a document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Fetch this URL; it is also the base for relative links.
    Url(String),
    /// Markup already in hand, with the URL it was served from.
    Markup { html: String, base_url: String },
}

impl Source {
    pub fn url(url: impl Into<String>) -> Self {
        Source::Url(url.into())
    }

    pub fn markup(html: impl Into<String>, base_url: impl Into<String>) -> Self {
        Source::Markup {
            html: html.into(),
            base_url: base_url.into(),
        }
    }

    /// The URL relative links resolve against.
    pub fn base_url(&self) -> &str {
        match self {
            Source::Url(url) => url,
            Source::Markup { base_url, .. } => base_url,
        }
    }
}

/// Retrieves raw markup for a URL.
pub trait Fetch {
    fn fetch(&self, url: &str) -> Result<String>;
}

/// Retry and request settings for [`HttpFetcher`].
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    /// Total number of attempts, at least one is always made.
    pub attempts: u32,
    /// Pause after a failed attempt.
    pub interval: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Blocking HTTP fetcher with bounded retries.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn fetch_once(&self, url: &str) -> std::result::Result<String, String> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }

        let charset = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_from_content_type);
        let bytes = response.bytes().map_err(|e| e.to_string())?;

        Ok(decode_text(&bytes, charset.as_deref()).into_owned())
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        let attempts = self.config.attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.fetch_once(url) {
                Ok(html) => {
                    debug!(url, attempt, bytes = html.len(), "fetched page");
                    return Ok(html);
                }
                Err(reason) => {
                    warn!(url, attempt, error = %reason, "fetch attempt failed");
                    last_error = reason;
                    if attempt < attempts {
                        sleep(self.config.interval);
                    }
                }
            }
        }

        Err(Error::Fetch {
            url: url.to_string(),
            attempts,
            reason: last_error,
        })
    }
}

impl<F: Fetch + ?Sized> Fetch for &F {
    fn fetch(&self, url: &str) -> Result<String> {
        (**self).fetch(url)
    }
}

impl<F: Fetch + ?Sized> Fetch for Box<F> {
    fn fetch(&self, url: &str) -> Result<String> {
        (**self).fetch(url)
    }
}
