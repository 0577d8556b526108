//! Clients for the remote roster and auth services.

mod api_types;
mod client;
mod types;

pub use client::{AuthApi, HttpAuthApi, HttpRosterApi, RosterApi};
pub use types::{Employee, NewEmployee, RosterSnapshot};
