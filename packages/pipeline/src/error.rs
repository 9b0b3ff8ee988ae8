//! Typed errors for the extraction pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.
//!
//! Deliberate non-errors: a sparse-content abort is a *successful* run
//! with zero records (`RunOutcome::SparseContent`), and an unresolved
//! anti-bot challenge degrades to best-available HTML with a warning.
//! Neither appears in this taxonomy.

use thiserror::Error;

/// Errors that can occur while acquiring a page.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// HTTP request failed (network, DNS, connect)
    #[error("HTTP error fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status
    #[error("HTTP status {status} fetching {url}")]
    Status { url: String, status: u16 },

    /// Request or navigation timed out
    #[error("timeout fetching {url}")]
    Timeout { url: String },

    /// Invalid URL format
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Headless browser launch or session failure
    #[error("browser error: {0}")]
    Browser(String),
}

/// Errors that can occur during structured extraction of one chunk.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Model invocation failed (network, endpoint, non-2xx)
    #[error("model invocation failed: {0}")]
    Invocation(String),

    /// Model output failed to parse even after one repair attempt
    #[error("malformed model output: {0}")]
    MalformedOutput(#[from] serde_json::Error),

    /// Model returned an empty response
    #[error("model returned no text")]
    EmptyResponse,
}

/// Errors that can terminate a whole job run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Acquisition failed with no HTML to fall back on
    #[error("acquisition failed: {0}")]
    Acquire(#[from] AcquireError),

    /// Extraction failed beyond chunk-level recovery
    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),

    /// Job not found in the store
    #[error("bot not found: {id}")]
    BotNotFound { id: uuid::Uuid },

    /// Job is already mid-run (no self-overlap)
    #[error("bot {id} is already running")]
    AlreadyRunning { id: uuid::Uuid },

    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Result type alias for acquisition operations.
pub type AcquireResult<T> = std::result::Result<T, AcquireError>;

/// Result type alias for extraction operations.
pub type ExtractResult<T> = std::result::Result<T, ExtractError>;
