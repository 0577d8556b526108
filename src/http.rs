//! Shared HTTP plumbing for the auth, roster and cache services.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use url::Url;

use crate::error::{Result, SyncError};

/// Build the HTTP client shared by every service.
pub fn build_client(timeout: Duration) -> Result<Client> {
  Client::builder()
    .timeout(timeout)
    .build()
    .map_err(|e| SyncError::Remote(format!("Failed to create HTTP client: {}", e)))
}

/// A service root plus the client used to reach it.
#[derive(Debug, Clone)]
pub struct Endpoint {
  client: Client,
  base: Url,
}

impl Endpoint {
  pub fn new(client: Client, base: &str) -> Result<Self> {
    let base = Url::parse(base)
      .map_err(|e| SyncError::InvalidArgument(format!("Invalid service URL {}: {}", base, e)))?;
    if base.cannot_be_a_base() {
      return Err(SyncError::InvalidArgument(format!(
        "Service URL cannot be used as a base: {}",
        base
      )));
    }
    Ok(Self { client, base })
  }

  /// Append path segments to the base URL. Segments are percent-encoded.
  pub fn url(&self, segments: &[&str]) -> Url {
    let mut url = self.base.clone();
    if !segments.is_empty() {
      // Checked in `new`
      if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
      }
    }
    url
  }

  pub fn get(&self, segments: &[&str]) -> RequestBuilder {
    self.client.get(self.url(segments))
  }

  pub fn post(&self, segments: &[&str]) -> RequestBuilder {
    self.client.post(self.url(segments))
  }

  pub fn patch(&self, segments: &[&str]) -> RequestBuilder {
    self.client.patch(self.url(segments))
  }

  pub fn delete(&self, segments: &[&str]) -> RequestBuilder {
    self.client.delete(self.url(segments))
  }
}

/// Map `403` to [`SyncError::Forbidden`] and any other failure status to
/// [`SyncError::Remote`].
pub fn check_status(response: Response, what: &str) -> Result<Response> {
  let status = response.status();
  if status == StatusCode::FORBIDDEN {
    return Err(SyncError::Forbidden);
  }
  if !status.is_success() {
    return Err(SyncError::Remote(format!(
      "{} failed with status {}",
      what, status
    )));
  }
  Ok(response)
}
