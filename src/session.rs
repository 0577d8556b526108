//! Bearer-token session and the in-memory encryption password.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::db::TokenStore;
use crate::remote::AuthApi;

/// What the roster store needs from a session.
pub trait SessionHandle: Send + Sync {
  /// Current bearer token, if authenticated.
  fn token(&self) -> Option<String>;

  /// Password used to derive cache encryption keys.
  fn encryption_password(&self) -> Option<String>;

  /// Drop the session, e.g. after the server rejected the token.
  fn logout(&self);
}

#[derive(Default)]
struct SessionState {
  token: Option<String>,
  encryption_password: Option<Zeroizing<String>>,
  error: Option<String>,
}

/// Authenticated session.
///
/// The token is persisted through a [`TokenStore`] so a restart does not
/// force a new login. The encryption password lives only in this struct.
pub struct Session {
  auth: Arc<dyn AuthApi>,
  tokens: Arc<dyn TokenStore>,
  state: Mutex<SessionState>,
  initialized: OnceCell<()>,
}

impl Session {
  pub fn new(auth: Arc<dyn AuthApi>, tokens: Arc<dyn TokenStore>) -> Self {
    Self {
      auth,
      tokens,
      state: Mutex::new(SessionState::default()),
      initialized: OnceCell::new(),
    }
  }

  fn state(&self) -> MutexGuard<'_, SessionState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Restore a persisted token if the auth service still accepts it.
  ///
  /// Runs once per session; concurrent and repeated callers wait for and
  /// share the first run.
  pub async fn initialize(&self) {
    self.initialized.get_or_init(|| self.restore()).await;
  }

  async fn restore(&self) {
    let token = match self.tokens.load() {
      Ok(Some(token)) => token,
      Ok(None) => {
        debug!("No persisted session token");
        return;
      }
      Err(e) => {
        warn!("Failed to read persisted token: {}", e);
        return;
      }
    };

    match self.auth.verify(&token).await {
      Ok(true) => {
        info!("Restored persisted session");
        self.state().token = Some(token);
      }
      Ok(false) => {
        info!("Persisted session token is no longer valid, discarding");
        if let Err(e) = self.tokens.clear() {
          warn!("Failed to discard persisted token: {}", e);
        }
      }
      Err(e) => {
        // Keep the stored token so the next start can try again
        warn!("Could not verify persisted token: {}", e);
      }
    }
  }

  /// Exchange `password` for a token. Returns whether login succeeded; the
  /// failure reason is available from [`Session::last_error`].
  pub async fn login(&self, password: &str) -> bool {
    self.state().error = None;

    match self.auth.login(password).await {
      Ok(token) => {
        if let Err(e) = self.tokens.save(&token) {
          warn!("Failed to persist session token: {}", e);
        }
        self.state().token = Some(token);
        info!("Logged in");
        true
      }
      Err(e) => {
        warn!("Login failed: {}", e);
        let mut state = self.state();
        state.token = None;
        state.error = Some(e.to_string());
        false
      }
    }
  }

  pub fn is_authenticated(&self) -> bool {
    self.state().token.is_some()
  }

  /// Set the cache encryption password. An empty string unsets it.
  pub fn set_encryption_password(&self, password: &str) {
    self.state().encryption_password =
      (!password.is_empty()).then(|| Zeroizing::new(password.to_string()));
  }

  pub fn last_error(&self) -> Option<String> {
    self.state().error.clone()
  }
}

impl SessionHandle for Session {
  fn token(&self) -> Option<String> {
    self.state().token.clone()
  }

  fn encryption_password(&self) -> Option<String> {
    self
      .state()
      .encryption_password
      .as_ref()
      .map(|pw| pw.as_str().to_string())
  }

  fn logout(&self) {
    {
      let mut state = self.state();
      state.token = None;
      state.encryption_password = None;
    }
    if let Err(e) = self.tokens.clear() {
      warn!("Failed to clear persisted token: {}", e);
    }
    info!("Logged out");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::MemoryTokenStore;
  use crate::testing::FakeAuth;

  type Parts = (Arc<FakeAuth>, Arc<MemoryTokenStore>, Session);

  fn session(auth: FakeAuth, tokens: MemoryTokenStore) -> Parts {
    let auth = Arc::new(auth);
    let tokens = Arc::new(tokens);
    let session = Session::new(auth.clone(), tokens.clone());
    (auth, tokens, session)
  }

  fn fresh_session() -> Parts {
    session(FakeAuth::accepting("secret", "tok-1"), MemoryTokenStore::default())
  }

  #[tokio::test]
  async fn test_login_persists_token() {
    let (_, tokens, session) = fresh_session();

    assert!(!session.is_authenticated());
    assert!(session.login("secret").await);
    assert!(session.is_authenticated());
    assert_eq!(session.token().as_deref(), Some("tok-1"));
    assert_eq!(tokens.load().unwrap().as_deref(), Some("tok-1"));
    assert_eq!(session.last_error(), None);
  }

  #[tokio::test]
  async fn test_login_failure_records_error() {
    let (_, tokens, session) = fresh_session();

    assert!(!session.login("wrong").await);
    assert!(!session.is_authenticated());
    assert!(session.last_error().is_some());
    assert_eq!(tokens.load().unwrap(), None);
  }

  #[tokio::test]
  async fn test_logout_clears_everything() {
    let (_, tokens, session) = fresh_session();
    session.login("secret").await;
    session.set_encryption_password("enc");

    session.logout();

    assert!(!session.is_authenticated());
    assert_eq!(session.token(), None);
    assert_eq!(session.encryption_password(), None);
    assert_eq!(tokens.load().unwrap(), None);
  }

  #[tokio::test]
  async fn test_initialize_restores_valid_token() {
    let (auth, _, session) = session(
      FakeAuth::accepting("secret", "tok-1"),
      MemoryTokenStore::with_token("tok-1"),
    );

    session.initialize().await;
    assert!(session.is_authenticated());

    // Idempotent: a second call does not verify again
    session.initialize().await;
    assert_eq!(auth.verify_calls(), 1);
  }

  #[tokio::test]
  async fn test_initialize_discards_invalid_token() {
    let (_, tokens, session) = session(
      FakeAuth::accepting("secret", "tok-1"),
      MemoryTokenStore::with_token("expired"),
    );

    session.initialize().await;
    assert!(!session.is_authenticated());
    assert_eq!(tokens.load().unwrap(), None);
  }

  #[tokio::test]
  async fn test_initialize_without_token() {
    let (auth, _, session) = fresh_session();
    session.initialize().await;
    assert!(!session.is_authenticated());
    assert_eq!(auth.verify_calls(), 0);
  }

  #[tokio::test]
  async fn test_encryption_password_is_memory_only() {
    let (_, tokens, session) = fresh_session();
    session.login("secret").await;

    session.set_encryption_password("enc");
    assert_eq!(session.encryption_password().as_deref(), Some("enc"));
    assert_eq!(tokens.load().unwrap().as_deref(), Some("tok-1"));

    session.set_encryption_password("");
    assert_eq!(session.encryption_password(), None);
  }
}
