//! Error taxonomy for the sync layer.

use thiserror::Error;

/// Failures surfaced by the session, cache client and roster store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
  /// No token (or no encryption password) is present for a protected operation.
  #[error("Authentication required")]
  AuthenticationRequired,

  /// A protected endpoint rejected the bearer token.
  #[error("Forbidden: session token was rejected")]
  Forbidden,

  /// The cache service could not serve the request.
  #[error("Cache unavailable: {0}")]
  CacheUnavailable(String),

  /// Wrong encryption password or corrupted cache blob.
  #[error("Failed to decrypt cached data")]
  DecryptionFailure,

  /// The roster service answered with a payload we could not understand.
  #[error("Invalid server response: {0}")]
  InvalidServerResponse(String),

  #[error("Invalid argument: {0}")]
  InvalidArgument(String),

  /// Network or HTTP failure not covered by the variants above.
  #[error("Remote error: {0}")]
  Remote(String),

  /// Local token storage failed.
  #[error("Storage error: {0}")]
  Storage(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl From<reqwest::Error> for SyncError {
  fn from(e: reqwest::Error) -> Self {
    SyncError::Remote(e.to_string())
  }
}

impl From<rusqlite::Error> for SyncError {
  fn from(e: rusqlite::Error) -> Self {
    SyncError::Storage(e.to_string())
  }
}
