//! In-memory stand-ins for the remote services, shared by unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::cache::{ApiCacheWrite, CacheRequest, CacheTransport, TransportResponse};
use crate::error::{Result, SyncError};
use crate::remote::{AuthApi, Employee, NewEmployee, RosterApi};

/// Cache service backed by a map. Scripted statuses take precedence over
/// the stored entries, one per request.
#[derive(Default)]
pub struct FakeCacheService {
  pub entries: Mutex<HashMap<String, ApiCacheWrite>>,
  pub scripted: Mutex<VecDeque<u16>>,
  pub requests: Mutex<Vec<CacheRequest>>,
  pub unreachable: AtomicBool,
}

impl FakeCacheService {
  pub fn script(&self, status: u16) {
    self.scripted.lock().unwrap().push_back(status);
  }

  pub fn request_count(&self) -> usize {
    self.requests.lock().unwrap().len()
  }

  pub fn writes(&self) -> Vec<ApiCacheWrite> {
    self
      .requests
      .lock()
      .unwrap()
      .iter()
      .filter_map(|r| match r {
        CacheRequest::Set { body, .. } => Some(body.clone()),
        _ => None,
      })
      .collect()
  }
}

#[async_trait]
impl CacheTransport for FakeCacheService {
  async fn send(&self, request: CacheRequest, _token: &str) -> Result<TransportResponse> {
    self.requests.lock().unwrap().push(request.clone());

    if self.unreachable.load(Ordering::SeqCst) {
      return Err(SyncError::Remote("connection refused".to_string()));
    }
    if let Some(status) = self.scripted.lock().unwrap().pop_front() {
      return Ok(TransportResponse::status(status));
    }

    let mut entries = self.entries.lock().unwrap();
    let response = match request {
      CacheRequest::Health => TransportResponse::status(200),
      CacheRequest::Get { key } => match entries.get(&key) {
        Some(write) => TransportResponse {
          status: 200,
          body: Some(serde_json::to_value(&write.data).unwrap()),
        },
        None => TransportResponse::status(404),
      },
      CacheRequest::Set { key, body } => {
        entries.insert(key, body);
        TransportResponse::status(200)
      }
      CacheRequest::Delete { key } => {
        entries.remove(&key);
        TransportResponse::status(200)
      }
      CacheRequest::Clear => {
        entries.clear();
        TransportResponse::status(200)
      }
    };
    Ok(response)
  }
}

/// Auth service accepting exactly one password.
pub struct FakeAuth {
  password: String,
  token: String,
  verify_calls: AtomicUsize,
}

impl FakeAuth {
  pub fn accepting(password: &str, token: &str) -> Self {
    Self {
      password: password.to_string(),
      token: token.to_string(),
      verify_calls: AtomicUsize::new(0),
    }
  }

  pub fn verify_calls(&self) -> usize {
    self.verify_calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl AuthApi for FakeAuth {
  async fn login(&self, password: &str) -> Result<String> {
    if password == self.password {
      Ok(self.token.clone())
    } else {
      Err(SyncError::Remote("Login failed with status 401 Unauthorized".to_string()))
    }
  }

  async fn verify(&self, token: &str) -> Result<bool> {
    self.verify_calls.fetch_add(1, Ordering::SeqCst);
    Ok(token == self.token)
  }
}

/// Roster service holding records in memory.
///
/// Errors pushed with [`FakeRoster::fail_next`] are returned by the next
/// call, whatever it is. [`FakeRoster::hold_next_list`] parks the next `list`
/// after it has read the records.
#[derive(Default)]
pub struct FakeRoster {
  pub employees: Mutex<Vec<Employee>>,
  pub last_update: Mutex<i64>,
  pub failures: Mutex<VecDeque<SyncError>>,
  pub calls: AtomicUsize,
  next_id: AtomicUsize,
  list_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeRoster {
  pub fn with_employees(employees: Vec<Employee>) -> Self {
    let roster = Self::default();
    roster.next_id.store(employees.len(), Ordering::SeqCst);
    *roster.employees.lock().unwrap() = employees;
    roster
  }

  pub fn fail_next(&self, error: SyncError) {
    self.failures.lock().unwrap().push_back(error);
  }

  /// The next `list` answers with the records as they are now, but only
  /// once the returned handle is notified.
  pub fn hold_next_list(&self) -> Arc<Notify> {
    let gate = Arc::new(Notify::new());
    *self.list_gate.lock().unwrap() = Some(gate.clone());
    gate
  }

  pub fn set_last_update(&self, ts: i64) {
    *self.last_update.lock().unwrap() = ts;
  }

  pub fn call_count(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  fn enter(&self) -> Result<()> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    match self.failures.lock().unwrap().pop_front() {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }
}

#[async_trait]
impl RosterApi for FakeRoster {
  async fn list(&self, _token: &str) -> Result<Vec<Employee>> {
    self.enter()?;
    let employees = self.employees.lock().unwrap().clone();
    let gate = self.list_gate.lock().unwrap().take();
    if let Some(gate) = gate {
      gate.notified().await;
    }
    Ok(employees)
  }

  async fn create(&self, _token: &str, employee: &NewEmployee) -> Result<Employee> {
    self.enter()?;
    let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
    let created = employee.clone().with_id(id.to_string());
    self.employees.lock().unwrap().push(created.clone());
    Ok(created)
  }

  async fn update(&self, _token: &str, employee: &Employee) -> Result<Employee> {
    self.enter()?;
    let mut employees = self.employees.lock().unwrap();
    match employees.iter_mut().find(|e| e.id == employee.id) {
      Some(existing) => {
        *existing = employee.clone();
        Ok(employee.clone())
      }
      None => Err(SyncError::Remote("Updating employee failed with status 404".to_string())),
    }
  }

  async fn delete(&self, _token: &str, id: &str) -> Result<()> {
    self.enter()?;
    self.employees.lock().unwrap().retain(|e| e.id != id);
    Ok(())
  }

  async fn last_update(&self, _token: &str) -> Result<i64> {
    self.enter()?;
    Ok(*self.last_update.lock().unwrap())
  }
}

pub fn employee(id: &str, first_name: &str) -> Employee {
  NewEmployee {
    first_name: first_name.to_string(),
    last_name: "Tester".to_string(),
    email: format!("{}@example.com", first_name.to_lowercase()),
    position: "Engineer".to_string(),
    ..Default::default()
  }
  .with_id(id)
}
