//! Encrypting client for the remote key/value cache.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::traits::{ApiCacheEntry, ApiCacheWrite, CacheRequest, CacheTransport};
use crate::crypto;
use crate::error::{Result, SyncError};

const STATUS_FORBIDDEN: u16 = 403;
const STATUS_NOT_FOUND: u16 = 404;

/// Cache client that encrypts values before they leave the process.
///
/// Tracks whether the cache service is reachable. Once a request fails the
/// client stops talking to the service (reads miss, writes are dropped)
/// until [`CacheClient::check_availability`] is called again.
pub struct CacheClient {
  transport: Arc<dyn CacheTransport>,
  available: AtomicBool,
}

impl CacheClient {
  pub fn new(transport: Arc<dyn CacheTransport>) -> Self {
    Self {
      transport,
      available: AtomicBool::new(true),
    }
  }

  /// Whether the last interaction with the cache service succeeded.
  pub fn is_available(&self) -> bool {
    self.available.load(Ordering::SeqCst)
  }

  fn mark_unavailable(&self, reason: &str) {
    if self.available.swap(false, Ordering::SeqCst) {
      warn!("Cache service marked unavailable: {}", reason);
    }
  }

  /// Probe the health endpoint and record the result. Never fails.
  pub async fn check_availability(&self, token: &str) -> bool {
    let available = match self.transport.send(CacheRequest::Health, token).await {
      Ok(response) => response.status == 200,
      Err(e) => {
        debug!("Cache health check failed: {}", e);
        false
      }
    };

    self.available.store(available, Ordering::SeqCst);
    available
  }

  /// Read and decrypt `key`.
  ///
  /// A miss, an unreachable service and a non-403 error all return
  /// `Ok(None)`. A 403 is `Forbidden`; an undecryptable entry is
  /// `DecryptionFailure`.
  pub async fn get<T: DeserializeOwned>(
    &self,
    key: &str,
    token: &str,
    password: &str,
  ) -> Result<Option<T>> {
    if !self.is_available() {
      return Ok(None);
    }

    let request = CacheRequest::Get {
      key: key.to_string(),
    };
    let response = match self.transport.send(request, token).await {
      Ok(response) => response,
      Err(e) => {
        self.mark_unavailable(&e.to_string());
        return Ok(None);
      }
    };

    match response.status {
      STATUS_NOT_FOUND => {
        debug!("Cache miss for {}", key);
        return Ok(None);
      }
      STATUS_FORBIDDEN => return Err(SyncError::Forbidden),
      _ if !response.is_success() => {
        self.mark_unavailable(&format!("GET {} returned {}", key, response.status));
        return Ok(None);
      }
      _ => {}
    }

    let entry: ApiCacheEntry = response
      .body
      .and_then(|body| serde_json::from_value(body).ok())
      .ok_or(SyncError::DecryptionFailure)?;

    let value = crypto::decrypt(&entry.encrypted, &entry.iv, password)?;
    debug!("Cache hit for {}", key);
    Ok(Some(value))
  }

  /// Encrypt and store `value` under `key` for `ttl_ms` milliseconds.
  ///
  /// Failures other than 403 are swallowed and flip the availability flag.
  pub async fn set<T: Serialize + ?Sized>(
    &self,
    key: &str,
    value: &T,
    ttl_ms: u64,
    token: &str,
    password: &str,
  ) -> Result<()> {
    if !self.is_available() {
      return Ok(());
    }
    if password.is_empty() {
      return Err(SyncError::InvalidArgument(
        "Encryption password must not be empty".to_string(),
      ));
    }

    let payload = crypto::encrypt(value, password)?;
    let request = CacheRequest::Set {
      key: key.to_string(),
      body: ApiCacheWrite {
        data: ApiCacheEntry {
          encrypted: payload.ciphertext,
          iv: payload.salt,
          auth_tag: String::new(),
        },
        ttl: ttl_ms,
      },
    };

    match self.transport.send(request, token).await {
      Ok(response) if response.status == STATUS_FORBIDDEN => Err(SyncError::Forbidden),
      Ok(response) if !response.is_success() => {
        self.mark_unavailable(&format!("POST {} returned {}", key, response.status));
        Ok(())
      }
      Ok(_) => {
        debug!("Cached {}", key);
        Ok(())
      }
      Err(e) => {
        self.mark_unavailable(&e.to_string());
        Ok(())
      }
    }
  }

  /// Remove a single entry.
  pub async fn delete(&self, key: &str, token: &str) -> Result<()> {
    let request = CacheRequest::Delete {
      key: key.to_string(),
    };
    self.send_checked(request, token, &format!("delete {}", key)).await
  }

  /// Remove every entry.
  pub async fn clear_all(&self, token: &str) -> Result<()> {
    self.send_checked(CacheRequest::Clear, token, "clear").await
  }

  async fn send_checked(&self, request: CacheRequest, token: &str, what: &str) -> Result<()> {
    let response = self
      .transport
      .send(request, token)
      .await
      .map_err(|e| SyncError::CacheUnavailable(format!("Failed to {}: {}", what, e)))?;

    match response.status {
      STATUS_FORBIDDEN => Err(SyncError::Forbidden),
      _ if response.is_success() => Ok(()),
      status => Err(SyncError::CacheUnavailable(format!(
        "Failed to {}: status {}",
        what, status
      ))),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::FakeCacheService;
  use serde_json::{json, Value};

  fn client() -> (Arc<FakeCacheService>, CacheClient) {
    let service = Arc::new(FakeCacheService::default());
    let client = CacheClient::new(service.clone());
    (service, client)
  }

  #[tokio::test]
  async fn test_set_then_get() {
    let (service, client) = client();
    let value = json!({"employees": [{"id": "1"}], "lastUpdate": 1000});

    client.set("employees", &value, 60_000, "tok", "pw").await.unwrap();
    let read: Option<Value> = client.get("employees", "tok", "pw").await.unwrap();

    assert_eq!(read, Some(value));
    let writes = service.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].ttl, 60_000);
    assert_eq!(writes[0].data.auth_tag, "");
    assert_eq!(writes[0].data.iv.len(), 32);
  }

  #[tokio::test]
  async fn test_get_never_set_is_none() {
    let (_, client) = client();
    let read: Option<Value> = client.get("employees", "tok", "pw").await.unwrap();
    assert_eq!(read, None);
    assert!(client.is_available());
  }

  #[tokio::test]
  async fn test_get_with_wrong_password_is_decryption_failure() {
    let (_, client) = client();
    client.set("k", &json!([1, 2, 3]), 1000, "tok", "right").await.unwrap();

    let err = client.get::<Value>("k", "tok", "wrong").await.unwrap_err();
    assert_eq!(err, SyncError::DecryptionFailure);
    assert!(client.is_available());
  }

  #[tokio::test]
  async fn test_get_forbidden_propagates() {
    let (service, client) = client();
    service.script(403);

    let err = client.get::<Value>("k", "tok", "pw").await.unwrap_err();
    assert_eq!(err, SyncError::Forbidden);
    assert!(client.is_available());
  }

  #[tokio::test]
  async fn test_set_forbidden_propagates() {
    let (service, client) = client();
    service.script(403);

    let err = client.set("k", &json!(1), 1000, "tok", "pw").await.unwrap_err();
    assert_eq!(err, SyncError::Forbidden);
  }

  #[tokio::test]
  async fn test_set_rejects_empty_password() {
    let (service, client) = client();
    let err = client.set("k", &json!(1), 1000, "tok", "").await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidArgument(_)));
    assert_eq!(service.request_count(), 0);
  }

  #[tokio::test]
  async fn test_server_error_degrades_without_further_requests() {
    let (service, client) = client();
    service.script(500);

    let read: Option<Value> = client.get("k", "tok", "pw").await.unwrap();
    assert_eq!(read, None);
    assert!(!client.is_available());
    assert_eq!(service.request_count(), 1);

    // Degraded: no network traffic for reads or writes
    for _ in 0..3 {
      let _: Option<Value> = client.get("k", "tok", "pw").await.unwrap();
      client.set("k", &json!(1), 1000, "tok", "pw").await.unwrap();
    }
    assert_eq!(service.request_count(), 1);

    // An explicit health check restores it
    assert!(client.check_availability("tok").await);
    client.set("k", &json!(1), 1000, "tok", "pw").await.unwrap();
    assert_eq!(service.request_count(), 3);
  }

  #[tokio::test]
  async fn test_write_failure_is_swallowed() {
    let (service, client) = client();
    service.script(503);

    client.set("k", &json!(1), 1000, "tok", "pw").await.unwrap();
    assert!(!client.is_available());
  }

  #[tokio::test]
  async fn test_unreachable_service() {
    let (service, client) = client();
    service.unreachable.store(true, Ordering::SeqCst);

    assert!(!client.check_availability("tok").await);
    assert!(!client.is_available());

    let read: Option<Value> = client.get("k", "tok", "pw").await.unwrap();
    assert_eq!(read, None);
    assert_eq!(service.request_count(), 1);
  }

  #[tokio::test]
  async fn test_health_non_200_marks_unavailable() {
    let (service, client) = client();
    service.script(502);
    assert!(!client.check_availability("tok").await);
    assert!(!client.is_available());
  }

  #[tokio::test]
  async fn test_corrupted_entry_is_decryption_failure() {
    let (service, client) = client();
    service.entries.lock().unwrap().insert(
      "k".to_string(),
      ApiCacheWrite {
        data: ApiCacheEntry {
          encrypted: "bm90IGNpcGhlcnRleHQ=".to_string(),
          iv: "00112233445566778899aabbccddeeff".to_string(),
          auth_tag: String::new(),
        },
        ttl: 1,
      },
    );

    let err = client.get::<Value>("k", "tok", "pw").await.unwrap_err();
    assert_eq!(err, SyncError::DecryptionFailure);
  }

  #[tokio::test]
  async fn test_delete_and_clear() {
    let (service, client) = client();
    client.set("a", &json!(1), 1000, "tok", "pw").await.unwrap();
    client.set("b", &json!(2), 1000, "tok", "pw").await.unwrap();

    client.delete("a", "tok").await.unwrap();
    assert!(client.get::<Value>("a", "tok", "pw").await.unwrap().is_none());
    assert!(client.get::<Value>("b", "tok", "pw").await.unwrap().is_some());

    client.clear_all("tok").await.unwrap();
    assert!(service.entries.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_delete_errors() {
    let (service, client) = client();
    service.script(403);
    assert_eq!(client.delete("a", "tok").await.unwrap_err(), SyncError::Forbidden);

    service.script(500);
    assert!(matches!(
      client.clear_all("tok").await.unwrap_err(),
      SyncError::CacheUnavailable(_)
    ));
  }
}
