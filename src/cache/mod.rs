//! Encrypted remote cache.
//!
//! This module provides the client side of the key/value cache service:
//! - Values are encrypted with the user's encryption password before upload
//! - A 404 is a miss, a 403 is an expired session
//! - Any other failure marks the service unavailable until the next health check

mod client;
mod http;
mod traits;

pub use client::CacheClient;
pub use http::HttpCacheTransport;
pub use traits::{ApiCacheEntry, ApiCacheWrite, CacheRequest, CacheTransport, TransportResponse};
