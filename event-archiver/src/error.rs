//! Error types for the archival pass
//!
//! `ArchiveError` is what a pass (or a single day inside it) fails with; the
//! narrower enums belong to the collaborator that produced them.

use thiserror::Error;

/// Startup configuration problems
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("One or more required environment variables are missing: {}", .0.join(", "))]
    Missing(Vec<String>),
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Event source failures
#[derive(Debug, Error)]
pub enum SourceError {
    /// Connect or timeout failure; the only kind that is retried
    #[error("Event source unreachable: {0}")]
    Connection(String),
    #[error("Event source returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed event page: {0}")]
    Malformed(String),
    #[error("HTTP client error: {0}")]
    Http(String),
    #[error("Event source still unreachable after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<SourceError>,
    },
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Connection(_))
    }

    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || e.is_request() {
            SourceError::Connection(e.to_string())
        } else if e.is_decode() {
            SourceError::Malformed(e.to_string())
        } else if let Some(status) = e.status() {
            SourceError::Status {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else {
            SourceError::Http(e.to_string())
        }
    }
}

/// Archive state store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("State store error")]
    Redis(#[from] redis::RedisError),
    #[error("Corrupt state entry for {key}: {value:?} is not a count")]
    CorruptValue { key: String, value: String },
    #[error("State store unavailable: {0}")]
    Unavailable(String),
}

/// Object storage failures
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Upload of {path} failed: {reason}")]
    Upload { path: String, reason: String },
    #[error("Path template {template:?} cannot be rendered for {date}")]
    PathTemplate { template: String, date: String },
}

/// Failure of a whole pass, or of one day within it
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error("Archive encryption failed")]
    Crypto(#[from] archive_crypto::CryptoError),
    #[error("Dump serialization failed")]
    Dump(#[from] serde_json::Error),
}

/// Render an error with its whole `source()` chain, outermost first.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        current = cause.source();
    }
    out
}
