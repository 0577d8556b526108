//! Durable local state. Only the bearer token is ever written here.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Result, SyncError};

/// Storage key for the bearer token.
pub const TOKEN_KEY: &str = "auth_token";
/// Database file inside [`data_dir`].
pub const DB_FILE: &str = "rostersync.db";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Persists the session token across restarts.
pub trait TokenStore: Send + Sync {
  fn load(&self) -> Result<Option<String>>;

  fn save(&self, token: &str) -> Result<()>;

  fn clear(&self) -> Result<()>;
}

/// SQLite-backed key/value store
pub struct SqliteTokenStore {
  conn: Mutex<Connection>,
}

impl SqliteTokenStore {
  /// Open or create the database at the default location
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| {
        SyncError::Storage(format!("Failed to create data directory: {}", e))
      })?;
    }

    let conn = Connection::open(path).map_err(|e| {
      SyncError::Storage(format!(
        "Failed to open database at {}: {}",
        path.display(),
        e
      ))
    })?;

    Self::with_connection(conn)
  }

  #[cfg(test)]
  pub fn in_memory() -> Result<Self> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(SCHEMA)
      .map_err(|e| SyncError::Storage(format!("Failed to run migrations: {}", e)))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Get the default database path
  pub fn default_path() -> Result<PathBuf> {
    Ok(data_dir()?.join(DB_FILE))
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| SyncError::Storage(format!("Lock poisoned: {}", e)))
  }
}

impl TokenStore for SqliteTokenStore {
  fn load(&self) -> Result<Option<String>> {
    let conn = self.lock()?;
    let token = conn
      .query_row(
        "SELECT value FROM kv WHERE key = ?",
        params![TOKEN_KEY],
        |row| row.get(0),
      )
      .optional()?;
    Ok(token)
  }

  fn save(&self, token: &str) -> Result<()> {
    let conn = self.lock()?;
    conn.execute(
      "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?, ?, datetime('now'))",
      params![TOKEN_KEY, token],
    )?;
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    let conn = self.lock()?;
    conn.execute("DELETE FROM kv WHERE key = ?", params![TOKEN_KEY])?;
    Ok(())
  }
}

/// Token store that forgets everything on exit.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryTokenStore {
  token: Mutex<Option<String>>,
}

#[cfg(test)]
impl MemoryTokenStore {
  pub fn with_token(token: &str) -> Self {
    Self {
      token: Mutex::new(Some(token.to_string())),
    }
  }
}

#[cfg(test)]
impl TokenStore for MemoryTokenStore {
  fn load(&self) -> Result<Option<String>> {
    let token = self
      .token
      .lock()
      .map_err(|e| SyncError::Storage(format!("Lock poisoned: {}", e)))?;
    Ok(token.clone())
  }

  fn save(&self, token: &str) -> Result<()> {
    let mut slot = self
      .token
      .lock()
      .map_err(|e| SyncError::Storage(format!("Lock poisoned: {}", e)))?;
    *slot = Some(token.to_string());
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    let mut slot = self
      .token
      .lock()
      .map_err(|e| SyncError::Storage(format!("Lock poisoned: {}", e)))?;
    *slot = None;
    Ok(())
  }
}

/// Application data directory (database and log file live here).
pub fn data_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| SyncError::Storage("Could not determine data directory".to_string()))?;

  Ok(data_dir.join("rostersync"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_sqlite_token_lifecycle() {
    let store = SqliteTokenStore::in_memory().unwrap();
    assert_eq!(store.load().unwrap(), None);

    store.save("abc").unwrap();
    assert_eq!(store.load().unwrap().as_deref(), Some("abc"));

    store.save("def").unwrap();
    assert_eq!(store.load().unwrap().as_deref(), Some("def"));

    store.clear().unwrap();
    assert_eq!(store.load().unwrap(), None);
  }

  #[test]
  fn test_default_path_is_in_data_dir() {
    let path = SqliteTokenStore::default_path().unwrap();
    assert_eq!(path.file_name().and_then(|n| n.to_str()), Some(DB_FILE));
    assert_eq!(path.parent(), Some(data_dir().unwrap().as_path()));
  }

  #[test]
  fn test_memory_token_store() {
    let store = MemoryTokenStore::with_token("t");
    assert_eq!(store.load().unwrap().as_deref(), Some("t"));
    store.clear().unwrap();
    assert_eq!(store.load().unwrap(), None);
  }
}
