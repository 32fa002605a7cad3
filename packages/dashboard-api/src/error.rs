//! Error types for the dashboard API client.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for client construction.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors raised while building or configuring an [`ApiClient`](crate::ApiClient).
///
/// Request failures are not `ApiError`s: they settle as
/// [`TransportError`](dashboard_store::TransportError) so the store can record
/// them.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The base URL could not be parsed.
    #[error("invalid API base URL `{url}`: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The base URL cannot have relative paths joined onto it.
    #[error("API base URL `{0}` cannot be a base")]
    CannotBeABase(String),

    /// The session file exists but could not be read.
    #[error("failed to read session file {}: {source}", path.display())]
    Session {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The underlying HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
