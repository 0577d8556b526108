use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::info;

use crate::cache::{CacheClient, HttpCacheTransport};
use crate::commands::Command;
use crate::config::Config;
use crate::db::SqliteTokenStore;
use crate::event::{Event, EventHandler};
use crate::http::build_client;
use crate::remote::{Employee, HttpAuthApi, HttpRosterApi};
use crate::session::{Session, SessionHandle};
use crate::store::{RosterStore, SyncState, ROSTER_CACHE_KEY};

/// Main application state
pub struct App {
  config: Config,
  session: Arc<Session>,
  cache: Arc<CacheClient>,
  store: RosterStore,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let client = build_client(config.http_timeout())?;

    let auth = HttpAuthApi::new(client.clone(), config.auth_url())?;
    let roster = HttpRosterApi::new(client.clone(), &config.roster.url)?;
    let transport = HttpCacheTransport::new(client, &config.cache.url)?;
    let tokens = SqliteTokenStore::open()?;

    let session = Arc::new(Session::new(Arc::new(auth), Arc::new(tokens)));
    let cache = Arc::new(CacheClient::new(Arc::new(transport)));
    let store = RosterStore::new(session.clone(), cache.clone(), Arc::new(roster))
      .with_cache_ttl(config.cache.ttl_ms);

    Ok(Self {
      config,
      session,
      cache,
      store,
    })
  }

  pub async fn run(&self, command: Command) -> Result<()> {
    self.session.initialize().await;
    if let Some(password) = Config::get_encryption_password() {
      self.session.set_encryption_password(&password);
    }

    match command {
      Command::Login => self.login().await?,
      Command::Logout => {
        self.session.logout();
        println!("Logged out");
      }
      Command::Status => self.status().await,
      Command::List => {
        self.store.load_employees().await?;
        self.print_roster();
      }
      Command::Fetch => {
        self.store.fetch_employees().await?;
        self.print_roster();
      }
      Command::Check => {
        // A cache hit checks for updates; a miss fetches fresh data
        self.store.load_employees().await?;
        let state = self.store.state();
        report_error(&state);
        if state.is_update_available {
          println!("Updates available, run `rostersync fetch`");
        } else {
          println!("Roster is up to date");
        }
      }
      Command::Add(args) => {
        let created = self.store.add_employee(args.into()).await?;
        report_error(&self.store.state());
        if let Some(employee) = created {
          println!("Added {} ({})", employee.full_name(), employee.id);
        }
      }
      Command::Update(args) => {
        self.store.load_employees().await?;
        let existing = self
          .store
          .employee(&args.id)
          .ok_or_else(|| eyre!("No employee with id {}", args.id))?;
        self.store.update_employee(args.apply(existing)).await?;
        report_error(&self.store.state());
      }
      Command::Remove { id } => {
        self.store.remove_employee(&id).await?;
        report_error(&self.store.state());
      }
      Command::Watch => self.watch().await?,
      Command::ClearCache { remote, all } => {
        self.store.clear_cache();
        if remote || all {
          let token = self
            .session
            .token()
            .ok_or_else(|| eyre!("Not logged in"))?;
          if all {
            self.cache.clear_all(&token).await?;
          } else {
            self.cache.delete(ROSTER_CACHE_KEY, &token).await?;
          }
        }
        println!("Cache cleared");
      }
    }

    Ok(())
  }

  async fn login(&self) -> Result<()> {
    let password = Config::get_password()?;
    if self.session.login(&password).await {
      println!("Logged in");
      Ok(())
    } else {
      Err(eyre!(
        "Login failed: {}",
        self.session.last_error().unwrap_or_default()
      ))
    }
  }

  async fn status(&self) {
    match self.session.token() {
      Some(token) => {
        println!("Session: authenticated");
        let available = self.cache.check_availability(&token).await;
        println!(
          "Cache service: {}",
          if available { "reachable" } else { "unreachable" }
        );
      }
      None => println!("Session: not logged in"),
    }
    println!(
      "Encryption password: {}",
      if self.session.encryption_password().is_some() {
        "set"
      } else {
        "not set (ROSTERSYNC_ENCRYPTION_PASSWORD)"
      }
    );
  }

  /// Load once, then poll for changes and refetch when the server has some.
  async fn watch(&self) -> Result<()> {
    self.store.load_employees().await?;
    self.print_roster();

    let mut events = EventHandler::new(self.config.poll_interval());
    info!("Watching roster every {:?}", self.config.poll_interval());

    while let Some(event) = events.next().await {
      match event {
        Event::Poll => {
          if !self.session.is_authenticated() {
            report_error(&self.store.state());
            break;
          }
          self.store.check_for_update().await;
          if self.store.state().is_update_available {
            self.store.fetch_employees().await?;
            self.print_roster();
          }
        }
        Event::Shutdown => break,
      }
    }

    Ok(())
  }

  fn print_roster(&self) {
    let state = self.store.state();
    report_error(&state);
    print_employees(&self.store.employees());
    if let Some(ts) = state.last_update {
      println!("Last update: {}", format_timestamp(ts));
    }
    if state.is_update_available {
      println!("Updates available on the server");
    }
  }
}

fn report_error(state: &SyncState) {
  if let Some(error) = &state.error {
    eprintln!("Error: {}", error);
  }
  if let Some(error) = &state.cache_error {
    eprintln!("Cached roster could not be read: {}", error);
  }
}

fn print_employees(employees: &[Employee]) {
  if employees.is_empty() {
    println!("No employees");
    return;
  }

  println!(
    "{:<8} {:<28} {:<32} {:<20} {}",
    "ID", "NAME", "EMAIL", "POSITION", "DEPARTMENT"
  );
  for e in employees {
    println!(
      "{:<8} {:<28} {:<32} {:<20} {}",
      e.id,
      e.full_name(),
      e.email,
      e.position,
      e.department.as_deref().unwrap_or("-")
    );
  }
}

fn format_timestamp(ms: i64) -> String {
  chrono::DateTime::from_timestamp_millis(ms)
    .map(|dt| dt.to_rfc3339())
    .unwrap_or_else(|| ms.to_string())
}
