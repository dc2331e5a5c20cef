//! Error types for fetch operations.

use thiserror::Error;

/// Result type for deduplicated fetches.
pub type FetchResult = Result<serde_json::Value, FetchError>;

/// Errors a domain fetch can produce.
///
/// `Clone` so a single rejection can be handed to every caller waiting on
/// the same deduplicated fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The network call failed in a way that may succeed on retry.
    #[error("transient network failure: {0}")]
    Transient(String),

    /// The response payload was malformed; retrying will not help.
    #[error("invalid payload: {0}")]
    Validation(String),
}
