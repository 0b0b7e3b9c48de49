//! Error types shared by the client, normalizer and store.

use thiserror::Error;

/// Maximum number of characters of a remote error body kept in the error.
pub const ERROR_BODY_LIMIT: usize = 200;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// The search endpoint returned zero hits for a name query.
    #[error("No artist found for query '{query}'")]
    NotFound { query: String },

    /// Any non-success HTTP response. `body` is truncated to [`ERROR_BODY_LIMIT`].
    #[error("Remote service error {status}: {body}")]
    RemoteService { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A payload was missing a field we cannot default.
    #[error("Malformed payload: {0}")]
    Decode(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl CatalogError {
    /// Build a [`CatalogError::RemoteService`] keeping only the head of the body.
    pub fn remote(status: u16, body: &str) -> Self {
        CatalogError::RemoteService {
            status,
            body: truncate_body(body),
        }
    }

    /// Whether a retry could plausibly succeed.
    ///
    /// Server-side failures (5xx) and timeouts/connection failures are
    /// transient. Client errors (4xx), missing artists and decoding problems
    /// are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::RemoteService { status, .. } => *status >= 500,
            CatalogError::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(e: serde_json::Error) -> Self {
        CatalogError::Decode(e.to_string())
    }
}

fn truncate_body(body: &str) -> String {
    body.chars().take(ERROR_BODY_LIMIT).collect()
}
