//! Typed errors for the aggregation engine.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to give callers
//! strongly-typed, composable error handling. `anyhow` is reserved for the
//! binary entrypoint.

use thiserror::Error;

/// Errors surfaced by the rate-limited HTTP layer (C2).
#[derive(Debug, Error)]
pub enum HttpError {
    /// robots.txt disallows the request; never retried.
    #[error("denied by robots.txt: {url}")]
    Denied { url: String },

    /// The per-call deadline elapsed.
    #[error("timeout fetching {url}")]
    Timeout { url: String },

    /// Transport-level failure (DNS, connect, TLS, etc.) after retries.
    #[error("transport error fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A non-2xx status survived the retry policy.
    #[error("http status {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    /// The ambient cancellation signal fired while waiting.
    #[error("cancelled fetching {url}")]
    Cancelled { url: String },

    /// The URL failed SSRF/scheme validation before any request was made.
    #[error("blocked url: {0}")]
    Security(#[from] SecurityError),
}

/// SSRF-protection errors raised by [`crate::http::security::UrlGuard`].
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("disallowed url scheme: {0}")]
    DisallowedScheme(String),

    #[error("blocked host: {0}")]
    BlockedHost(String),

    #[error("blocked ip range: {0}")]
    BlockedCidr(String),

    #[error("url has no host")]
    NoHost,

    #[error("too many redirects")]
    TooManyRedirects,

    #[error("redirect changed scheme")]
    RedirectSchemeChanged,

    #[error("invalid url: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("dns resolution failed: {0}")]
    DnsResolution(String),
}

/// Errors raised while a scraper enumerates one query against one source.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] HttpError),

    #[error("extraction failed: {reason}")]
    Extraction { reason: String },

    #[error("career-page configuration invalid: {reason}")]
    Configuration { reason: String },
}

/// Errors raised by a [`crate::repository::JobRepository`] implementation.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("record not found")]
    NotFound,
}

/// Top-level error type for the engine, used by the admin surface to map
/// failures onto the stable error codes from the admin HTTP contract.
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("a run is already in progress")]
    AlreadyRunning,

    #[error("not found")]
    NotFound,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl AggregatorError {
    /// Stable error code used in the admin HTTP envelope (spec §6).
    pub fn code(&self) -> &'static str {
        match self {
            AggregatorError::AlreadyRunning => "ALREADY_RUNNING",
            AggregatorError::NotFound | AggregatorError::Repository(RepositoryError::NotFound) => {
                "NOT_FOUND"
            }
            AggregatorError::InvalidRequest(_) => "INVALID_REQUEST",
            AggregatorError::Http(_) | AggregatorError::Scrape(_) | AggregatorError::Repository(_) => {
                "INTERNAL"
            }
        }
    }
}

pub type HttpResult<T> = std::result::Result<T, HttpError>;
pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;
pub type Result<T> = std::result::Result<T, AggregatorError>;
