//! Serde types matching the auth and roster service wire format.
//!
//! Kept apart from the domain types in `types.rs` so the envelopes can
//! change without touching the store.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::Employee;
use crate::error::{Result, SyncError};

#[derive(Debug, Serialize)]
pub struct ApiLoginRequest<'a> {
  pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ApiLoginResponse {
  pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiLastUpdateResponse {
  #[serde(default)]
  pub success: bool,
  pub timestamp_unix: Option<i64>,
}

impl ApiLastUpdateResponse {
  /// Remote last-modified time in epoch milliseconds.
  pub fn into_timestamp(self) -> Result<i64> {
    match (self.success, self.timestamp_unix) {
      (true, Some(ts)) => Ok(ts),
      (true, None) => Err(SyncError::InvalidServerResponse(
        "last-update response is missing timestampUnix".to_string(),
      )),
      (false, _) => Err(SyncError::Remote(
        "Roster service could not report its last update".to_string(),
      )),
    }
  }
}

/// Validate a roster listing. The body must be a JSON array of records.
pub fn parse_roster(body: Value) -> Result<Vec<Employee>> {
  if !body.is_array() {
    return Err(SyncError::InvalidServerResponse(
      "expected an array of employees".to_string(),
    ));
  }

  serde_json::from_value(body).map_err(|e| SyncError::InvalidServerResponse(e.to_string()))
}

/// Validate a single record returned by a mutation.
pub fn parse_employee(body: Value) -> Result<Employee> {
  serde_json::from_value(body).map_err(|e| SyncError::InvalidServerResponse(e.to_string()))
}
