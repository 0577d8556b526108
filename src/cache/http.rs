//! HTTP implementation of the cache transport.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use super::traits::{CacheRequest, CacheTransport, TransportResponse};
use crate::error::Result;
use crate::http::Endpoint;

/// Talks to the cache service under `<base>/cache`.
#[derive(Debug, Clone)]
pub struct HttpCacheTransport {
  endpoint: Endpoint,
}

impl HttpCacheTransport {
  pub fn new(client: Client, base_url: &str) -> Result<Self> {
    Ok(Self {
      endpoint: Endpoint::new(client, base_url)?,
    })
  }
}

#[async_trait]
impl CacheTransport for HttpCacheTransport {
  async fn send(&self, request: CacheRequest, token: &str) -> Result<TransportResponse> {
    let builder = match &request {
      CacheRequest::Health => self.endpoint.get(&["cache", "health"]),
      CacheRequest::Get { key } => self.endpoint.get(&["cache", key.as_str()]),
      CacheRequest::Set { key, body } => self.endpoint.post(&["cache", key.as_str()]).json(body),
      CacheRequest::Delete { key } => self.endpoint.delete(&["cache", key.as_str()]),
      CacheRequest::Clear => self.endpoint.delete(&["cache"]),
    };

    let response = builder.bearer_auth(token).send().await?;
    let status = response.status();

    // Only successful reads carry a body we care about
    if matches!(request, CacheRequest::Get { .. }) && status == StatusCode::OK {
      return Ok(TransportResponse {
        status: status.as_u16(),
        body: response.json::<Value>().await.ok(),
      });
    }

    Ok(TransportResponse::status(status.as_u16()))
  }
}
