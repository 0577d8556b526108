//! Transport seam between the cache client and the cache service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Encrypted entry as stored by the cache service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCacheEntry {
  pub encrypted: String,
  pub iv: String,
  /// Always empty; kept for wire compatibility.
  #[serde(default)]
  pub auth_tag: String,
}

/// Body of a cache write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCacheWrite {
  pub data: ApiCacheEntry,
  /// Requested lifetime in milliseconds.
  pub ttl: u64,
}

/// One call against the cache service.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheRequest {
  Health,
  Get { key: String },
  Set { key: String, body: ApiCacheWrite },
  Delete { key: String },
  Clear,
}

/// Status and (for reads) JSON body of a cache service reply.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
  pub status: u16,
  pub body: Option<Value>,
}

impl TransportResponse {
  pub fn status(status: u16) -> Self {
    Self { status, body: None }
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// Sends requests to the cache service.
///
/// `Err` means the service could not be reached at all; any HTTP reply,
/// including error statuses, is an `Ok(TransportResponse)`.
#[async_trait]
pub trait CacheTransport: Send + Sync {
  async fn send(&self, request: CacheRequest, token: &str) -> Result<TransportResponse>;
}
