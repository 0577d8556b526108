use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::api_types::{
  parse_employee, parse_roster, ApiLastUpdateResponse, ApiLoginRequest, ApiLoginResponse,
};
use super::types::{Employee, NewEmployee};
use crate::error::{Result, SyncError};
use crate::http::{check_status, Endpoint};

/// Token issuance and verification.
#[async_trait]
pub trait AuthApi: Send + Sync {
  /// Exchange a login password for a bearer token.
  async fn login(&self, password: &str) -> Result<String>;

  /// Whether the service still accepts `token`.
  async fn verify(&self, token: &str) -> Result<bool>;
}

/// CRUD on the authoritative roster plus its last-modified timestamp.
#[async_trait]
pub trait RosterApi: Send + Sync {
  async fn list(&self, token: &str) -> Result<Vec<Employee>>;

  async fn create(&self, token: &str, employee: &NewEmployee) -> Result<Employee>;

  async fn update(&self, token: &str, employee: &Employee) -> Result<Employee>;

  async fn delete(&self, token: &str, id: &str) -> Result<()>;

  /// Last roster modification in epoch milliseconds.
  async fn last_update(&self, token: &str) -> Result<i64>;
}

/// Auth API client
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
  endpoint: Endpoint,
}

impl HttpAuthApi {
  pub fn new(client: Client, base_url: &str) -> Result<Self> {
    Ok(Self {
      endpoint: Endpoint::new(client, base_url)?,
    })
  }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
  async fn login(&self, password: &str) -> Result<String> {
    let response = self
      .endpoint
      .post(&["auth", "login"])
      .json(&ApiLoginRequest { password })
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      return Err(SyncError::Remote(format!("Login failed with status {}", status)));
    }

    let body: ApiLoginResponse = response
      .json()
      .await
      .map_err(|e| {
        SyncError::InvalidServerResponse(format!("Failed to parse login response: {}", e))
      })?;

    Ok(body.token)
  }

  async fn verify(&self, token: &str) -> Result<bool> {
    let response = self
      .endpoint
      .get(&["auth", "verify"])
      .bearer_auth(token)
      .send()
      .await?;

    Ok(response.status().is_success())
  }
}

/// Roster service client
#[derive(Debug, Clone)]
pub struct HttpRosterApi {
  endpoint: Endpoint,
}

impl HttpRosterApi {
  pub fn new(client: Client, base_url: &str) -> Result<Self> {
    Ok(Self {
      endpoint: Endpoint::new(client, base_url)?,
    })
  }
}

#[async_trait]
impl RosterApi for HttpRosterApi {
  async fn list(&self, token: &str) -> Result<Vec<Employee>> {
    let response = self.endpoint.get(&[]).bearer_auth(token).send().await?;
    let response = check_status(response, "Fetching employees")?;

    let body: Value = response
      .json()
      .await
      .map_err(|e| SyncError::InvalidServerResponse(e.to_string()))?;

    parse_roster(body)
  }

  async fn create(&self, token: &str, employee: &NewEmployee) -> Result<Employee> {
    let response = self
      .endpoint
      .post(&["new"])
      .bearer_auth(token)
      .json(employee)
      .send()
      .await?;
    let response = check_status(response, "Adding employee")?;

    let body: Value = response
      .json()
      .await
      .map_err(|e| SyncError::InvalidServerResponse(e.to_string()))?;

    parse_employee(body)
  }

  async fn update(&self, token: &str, employee: &Employee) -> Result<Employee> {
    let response = self
      .endpoint
      .patch(&[employee.id.as_str()])
      .bearer_auth(token)
      .json(employee)
      .send()
      .await?;
    let response = check_status(response, "Updating employee")?;

    // Some deployments answer a PATCH with an empty body
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
      return Ok(employee.clone());
    }

    let body: Value = serde_json::from_slice(&bytes)
      .map_err(|e| SyncError::InvalidServerResponse(e.to_string()))?;

    parse_employee(body)
  }

  async fn delete(&self, token: &str, id: &str) -> Result<()> {
    let response = self
      .endpoint
      .delete(&[id])
      .bearer_auth(token)
      .send()
      .await?;
    check_status(response, "Removing employee")?;
    Ok(())
  }

  async fn last_update(&self, token: &str) -> Result<i64> {
    let response = self
      .endpoint
      .get(&["meta", "last-update"])
      .bearer_auth(token)
      .send()
      .await?;
    let response = check_status(response, "Checking for updates")?;

    let body: ApiLastUpdateResponse = response
      .json()
      .await
      .map_err(|e| SyncError::InvalidServerResponse(e.to_string()))?;

    body.into_timestamp()
  }
}
