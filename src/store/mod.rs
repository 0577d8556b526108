//! Roster sync store.
//!
//! Orchestrates the session, the encrypted cache and the roster service to
//! keep one local view of the roster:
//! - `load_employees` prefers the cache and falls back to the server
//! - `fetch_employees` always asks the server and writes the result through
//! - `check_for_update` compares the server's last-modified stamp to ours
//! - mutations go to the server first, then to the local view, then to the cache
//!
//! Local state sits behind a plain mutex that is never held across an
//! `.await`, so each transition is atomic with respect to other operations.
//! Cache writes are serialized and ordered by commit revision. A fetch that
//! was in flight while another commit landed is dropped.

mod state;

pub use state::{Roster, SyncState};

use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::cache::CacheClient;
use crate::error::{Result, SyncError};
use crate::remote::{Employee, NewEmployee, RosterApi, RosterSnapshot};
use crate::session::SessionHandle;

/// Cache key holding the whole roster snapshot.
pub const ROSTER_CACHE_KEY: &str = "employees";
/// Default cache entry lifetime: one hour.
pub const DEFAULT_CACHE_TTL_MS: u64 = 60 * 60 * 1000;
/// Shown when the server rejects the session token.
pub const SESSION_EXPIRED: &str = "Session expired, please login again";

/// Source of "now" in epoch milliseconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// How a failed operation ended for the caller.
#[derive(Debug)]
enum Outcome {
  /// Recorded in the store state; the caller sees success.
  Recovered,
  /// Recorded and returned to the caller.
  Propagated(SyncError),
}

impl Outcome {
  fn into_result(self) -> Result<()> {
    match self {
      Outcome::Recovered => Ok(()),
      Outcome::Propagated(e) => Err(e),
    }
  }
}

#[derive(Default)]
struct Inner {
  roster: Roster,
  sync: SyncState,
  /// Bumped on every commit to the roster; orders cache writes.
  revision: u64,
}

impl Inner {
  fn bump(&mut self) -> (RosterSnapshot, u64) {
    self.revision += 1;
    let snapshot = RosterSnapshot {
      employees: self.roster.as_slice().to_vec(),
      last_update: self.sync.last_update.unwrap_or_default(),
    };
    (snapshot, self.revision)
  }
}

pub struct RosterStore {
  session: Arc<dyn SessionHandle>,
  cache: Arc<CacheClient>,
  roster: Arc<dyn RosterApi>,
  cache_ttl_ms: u64,
  clock: Clock,
  inner: Mutex<Inner>,
  /// Revision of the last snapshot written to the cache.
  write_gate: tokio::sync::Mutex<u64>,
}

impl RosterStore {
  pub fn new(
    session: Arc<dyn SessionHandle>,
    cache: Arc<CacheClient>,
    roster: Arc<dyn RosterApi>,
  ) -> Self {
    Self {
      session,
      cache,
      roster,
      cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
      clock: Arc::new(|| Utc::now().timestamp_millis()),
      inner: Mutex::new(Inner::default()),
      write_gate: tokio::sync::Mutex::new(0),
    }
  }

  pub fn with_cache_ttl(mut self, ttl_ms: u64) -> Self {
    self.cache_ttl_ms = ttl_ms;
    self
  }

  pub fn with_clock(mut self, clock: Clock) -> Self {
    self.clock = clock;
    self
  }

  fn inner(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn update<R>(&self, f: impl FnOnce(&mut SyncState) -> R) -> R {
    f(&mut self.inner().sync)
  }

  /// Apply `f` to the roster and bump the revision. Returns the snapshot to
  /// write through and its revision.
  fn commit(&self, f: impl FnOnce(&mut Inner)) -> (RosterSnapshot, u64) {
    let mut inner = self.inner();
    f(&mut inner);
    inner.bump()
  }

  /// Like [`Self::commit`], but only if `f` returns true.
  fn commit_if(&self, f: impl FnOnce(&mut Inner) -> bool) -> Option<(RosterSnapshot, u64)> {
    let mut inner = self.inner();
    f(&mut inner).then(|| inner.bump())
  }

  fn now(&self) -> i64 {
    (self.clock)()
  }

  // ==========================================================================
  // Accessors
  // ==========================================================================

  pub fn employees(&self) -> Vec<Employee> {
    self.inner().roster.as_slice().to_vec()
  }

  pub fn employee(&self, id: &str) -> Option<Employee> {
    self.inner().roster.get(id).cloned()
  }

  pub fn state(&self) -> SyncState {
    self.inner().sync.clone()
  }

  // ==========================================================================
  // Session helpers
  // ==========================================================================

  fn credentials(&self) -> Result<(String, String)> {
    let token = self
      .session
      .token()
      .ok_or(SyncError::AuthenticationRequired)?;
    let password = self
      .session
      .encryption_password()
      .ok_or(SyncError::AuthenticationRequired)?;
    Ok((token, password))
  }

  /// The session still holds the token a request was made with.
  fn still_current(&self, token: &str) -> bool {
    let current = self.session.token().as_deref() == Some(token);
    if !current {
      debug!("Session changed while a request was in flight, discarding result");
    }
    current
  }

  /// Record a failure. `Forbidden` always ends the session and is always
  /// recovered; anything else is propagated when `propagate` is set.
  fn settle(&self, error: SyncError, propagate: bool) -> Outcome {
    if error == SyncError::Forbidden {
      warn!("Server rejected the session token, logging out");
      self.session.logout();
      self.update(|s| s.error = Some(SESSION_EXPIRED.to_string()));
      return Outcome::Recovered;
    }

    warn!("{}", error);
    self.update(|s| s.error = Some(error.to_string()));

    if propagate {
      Outcome::Propagated(error)
    } else {
      Outcome::Recovered
    }
  }

  // ==========================================================================
  // Operations
  // ==========================================================================

  /// Initial load: serve from cache when possible, otherwise fetch.
  pub async fn load_employees(&self) -> Result<()> {
    let token = self
      .session
      .token()
      .ok_or(SyncError::AuthenticationRequired)?;

    self.update(|s| {
      s.loading = true;
      s.error = None;
    });
    let result = self.load_from_cache_or_fetch(&token).await;
    self.update(|s| s.loading = false);
    result
  }

  async fn load_from_cache_or_fetch(&self, token: &str) -> Result<()> {
    let available = self.cache.check_availability(token).await;
    let mut cache_error = None;

    match self.session.encryption_password() {
      Some(password) if available => {
        match self
          .cache
          .get::<RosterSnapshot>(ROSTER_CACHE_KEY, token, &password)
          .await
        {
          Ok(Some(snapshot)) => {
            if !self.still_current(token) {
              return Ok(());
            }
            self.apply_cached(snapshot);
            self.check_for_update().await;
            return Ok(());
          }
          Ok(None) => debug!("Roster not cached, fetching from server"),
          Err(SyncError::Forbidden) => {
            return self.settle(SyncError::Forbidden, false).into_result();
          }
          Err(e) => {
            warn!("Cached roster unusable, fetching from server: {}", e);
            cache_error = Some(e);
          }
        }
      }
      Some(_) => debug!("Cache service unavailable, fetching from server"),
      None => debug!("No encryption password set, skipping cache"),
    }

    let result = self.fetch_employees().await;
    // The fetch clears it; keep the reason this load skipped the cache
    if cache_error.is_some() {
      self.update(|s| s.cache_error = cache_error);
    }
    result
  }

  fn apply_cached(&self, snapshot: RosterSnapshot) {
    let count = snapshot.employees.len();
    self.commit(|inner| {
      // Never move back in time
      if inner.sync.last_update.is_some_and(|local| local > snapshot.last_update) {
        debug!("Cached roster is older than the local view, keeping local data");
        return;
      }
      inner.roster.replace(snapshot.employees);
      inner.sync.last_update = Some(snapshot.last_update);
      inner.sync.cache_error = None;
    });
    info!("Loaded {} employees from cache", count);
  }

  /// Fetch the full roster from the server and write it through to the cache.
  ///
  /// Server failures are recorded in [`SyncState::error`]; only a malformed
  /// response is returned to the caller. The result is dropped if the local
  /// roster changed while the request was in flight.
  pub async fn fetch_employees(&self) -> Result<()> {
    let (token, password) = self.credentials()?;

    let started_at = {
      let mut inner = self.inner();
      inner.sync.fetching = true;
      inner.sync.error = None;
      inner.revision
    };

    let employees = match self.roster.list(&token).await {
      Ok(employees) => employees,
      Err(e) => {
        self.update(|s| s.fetching = false);
        let propagate = matches!(e, SyncError::InvalidServerResponse(_));
        return self.settle(e, propagate).into_result();
      }
    };

    if !self.still_current(&token) {
      self.update(|s| s.fetching = false);
      return Ok(());
    }

    let now = self.now();
    let committed = self.commit_if(|inner| {
      inner.sync.fetching = false;
      if inner.revision != started_at {
        return false;
      }
      inner.roster.replace(employees);
      inner.sync.last_update = Some(inner.sync.last_update.map_or(now, |prev| prev.max(now)));
      inner.sync.is_update_available = false;
      inner.sync.error = None;
      inner.sync.cache_error = None;
      true
    });
    let Some((snapshot, revision)) = committed else {
      debug!("Roster changed locally while fetching, dropping fetched roster");
      return Ok(());
    };
    info!("Fetched {} employees", snapshot.employees.len());

    if !snapshot.employees.is_empty() {
      self.write_through(snapshot, revision, &token, &password).await;
    }
    Ok(())
  }

  /// Ask the server whether the roster changed since `last_update`.
  ///
  /// Does nothing before the first successful load or without a session.
  pub async fn check_for_update(&self) {
    let Some(token) = self.session.token() else {
      return;
    };
    let Some(local) = self.update(|s| s.last_update) else {
      debug!("No local roster yet, skipping update check");
      return;
    };

    match self.roster.last_update(&token).await {
      Ok(remote) => {
        if !self.still_current(&token) {
          return;
        }
        if remote > local {
          info!("Roster changed on the server ({} > {})", remote, local);
          self.update(|s| s.is_update_available = true);
        }
      }
      Err(e) => {
        self.update(|s| s.is_update_available = false);
        // Never propagated
        let _ = self.settle(e, false);
      }
    }
  }

  /// Dismiss the update prompt without fetching.
  pub fn acknowledge_update(&self) {
    self.update(|s| s.is_update_available = false);
  }

  /// Create a record on the server and append it locally.
  ///
  /// Returns the created record, or `None` when the session ended while
  /// the request was in flight.
  pub async fn add_employee(&self, employee: NewEmployee) -> Result<Option<Employee>> {
    let (token, password) = self.credentials()?;
    self.begin_mutation();

    match self.roster.create(&token, &employee).await {
      Ok(created) => {
        let applied = created.clone();
        let committed = self
          .apply_mutation(&token, &password, move |roster| roster.upsert(applied))
          .await;
        Ok(committed.then_some(created))
      }
      Err(e) => {
        self.update(|s| s.fetching = false);
        self.settle(e, true).into_result().map(|_| None)
      }
    }
  }

  /// Update a record on the server and replace it locally.
  pub async fn update_employee(&self, employee: Employee) -> Result<()> {
    let (token, password) = self.credentials()?;
    self.begin_mutation();

    match self.roster.update(&token, &employee).await {
      Ok(updated) => {
        self
          .apply_mutation(&token, &password, move |roster| {
            if !roster.replace_existing(updated) {
              debug!("Updated employee is not held locally, leaving roster as is");
            }
          })
          .await;
        Ok(())
      }
      Err(e) => {
        self.update(|s| s.fetching = false);
        self.settle(e, true).into_result()
      }
    }
  }

  /// Delete a record on the server and drop it locally.
  pub async fn remove_employee(&self, id: &str) -> Result<()> {
    let (token, password) = self.credentials()?;
    self.begin_mutation();

    match self.roster.delete(&token, id).await {
      Ok(()) => {
        let id = id.to_string();
        self
          .apply_mutation(&token, &password, move |roster| roster.remove(&id))
          .await;
        Ok(())
      }
      Err(e) => {
        self.update(|s| s.fetching = false);
        self.settle(e, true).into_result()
      }
    }
  }

  /// Forget the local roster. Does not touch the cache service.
  pub fn clear_cache(&self) {
    let mut inner = self.inner();
    inner.roster.clear();
    inner.sync.last_update = None;
    inner.sync.is_update_available = false;
    inner.revision += 1;
    info!("Cleared local roster");
  }

  fn begin_mutation(&self) {
    self.update(|s| {
      s.fetching = true;
      s.error = None;
    });
  }

  /// Commit a successful server mutation locally and write the full
  /// snapshot through. Returns false if the session ended meanwhile.
  async fn apply_mutation(
    &self,
    token: &str,
    password: &str,
    apply: impl FnOnce(&mut Roster),
  ) -> bool {
    if !self.still_current(token) {
      self.update(|s| s.fetching = false);
      return false;
    }

    let now = self.now();
    let (snapshot, revision) = self.commit(|inner| {
      apply(&mut inner.roster);
      inner.sync.last_update = Some(inner.sync.last_update.map_or(now, |prev| prev.max(now)));
      inner.sync.fetching = false;
      inner.sync.error = None;
    });

    self.write_through(snapshot, revision, token, password).await;
    true
  }

  /// Best-effort cache write of a committed snapshot.
  ///
  /// Writes are serialized; a snapshot older than one already written is
  /// dropped so a slow write can never replace newer data.
  async fn write_through(
    &self,
    snapshot: RosterSnapshot,
    revision: u64,
    token: &str,
    password: &str,
  ) {
    let mut written = self.write_gate.lock().await;
    if revision < *written {
      debug!(
        "Skipping cache write of revision {} (revision {} already written)",
        revision, *written
      );
      return;
    }

    match self
      .cache
      .set(ROSTER_CACHE_KEY, &snapshot, self.cache_ttl_ms, token, password)
      .await
    {
      Ok(()) => *written = revision,
      Err(SyncError::Forbidden) => {
        drop(written);
        let _ = self.settle(SyncError::Forbidden, false);
      }
      Err(e) => warn!("Failed to write roster to cache: {}", e),
    }
  }
}
