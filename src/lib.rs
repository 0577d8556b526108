//! Encrypted offline cache and sync engine for an employee roster.
//!
//! The [`store::RosterStore`] keeps a local view of the roster fresh against
//! the roster service, using the [`cache::CacheClient`] as an encrypted
//! offline copy and the [`session::Session`] for authentication.

pub mod app;
pub mod cache;
pub mod commands;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod event;
pub mod http;
pub mod logging;
pub mod remote;
pub mod session;
pub mod store;
#[cfg(test)]
mod testing;

pub use error::{Result, SyncError};
