use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// Events driving the `watch` loop
#[derive(Debug, PartialEq, Eq)]
pub enum Event {
  /// Time to ask the server for roster changes
  Poll,
  /// Ctrl-C received
  Shutdown,
}

/// Event handler that produces poll ticks and a shutdown signal
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler polling at the given interval.
  /// The first poll fires one full interval after creation.
  pub fn new(poll_interval: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // Spawn poll timer
    let poll_tx = tx.clone();
    tokio::spawn(async move {
      let start = tokio::time::Instant::now() + poll_interval;
      let mut interval = tokio::time::interval_at(start, poll_interval);
      interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
      loop {
        interval.tick().await;
        if poll_tx.send(Event::Poll).is_err() {
          break;
        }
      }
    });

    // Spawn signal listener
    tokio::spawn(async move {
      match tokio::signal::ctrl_c().await {
        Ok(()) => {
          let _ = tx.send(Event::Shutdown);
        }
        Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
      }
    });

    Self { rx }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
