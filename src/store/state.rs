//! Local roster view and synchronization flags.

use std::collections::HashMap;

use crate::error::SyncError;
use crate::remote::Employee;

/// Progress and freshness flags exposed to the UI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncState {
  /// Epoch milliseconds of the last known-good synchronization point.
  pub last_update: Option<i64>,
  /// The server reported changes newer than `last_update`.
  pub is_update_available: bool,
  /// Initial load in progress.
  pub loading: bool,
  /// Remote fetch or mutation in progress.
  pub fetching: bool,
  /// Last user-visible failure.
  pub error: Option<String>,
  /// Why the last cache read could not be used, if it failed.
  /// `DecryptionFailure` here usually means a wrong encryption password.
  pub cache_error: Option<SyncError>,
}

/// Employees unique by id.
#[derive(Debug, Clone, Default)]
pub struct Roster {
  employees: Vec<Employee>,
}

impl Roster {
  /// Replace the collection. Duplicate ids keep the last record, at the
  /// position of the first.
  pub fn replace(&mut self, employees: Vec<Employee>) {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<Employee> = Vec::with_capacity(employees.len());

    for employee in employees {
      match positions.get(&employee.id) {
        Some(&idx) => unique[idx] = employee,
        None => {
          positions.insert(employee.id.clone(), unique.len());
          unique.push(employee);
        }
      }
    }

    self.employees = unique;
  }

  /// Append, or replace a record that already carries the same id.
  pub fn upsert(&mut self, employee: Employee) {
    match self.employees.iter_mut().find(|e| e.id == employee.id) {
      Some(existing) => *existing = employee,
      None => self.employees.push(employee),
    }
  }

  /// Replace the record with the same id. Returns false, leaving the
  /// collection untouched, if no such record is held.
  pub fn replace_existing(&mut self, employee: Employee) -> bool {
    match self.employees.iter_mut().find(|e| e.id == employee.id) {
      Some(existing) => {
        *existing = employee;
        true
      }
      None => false,
    }
  }

  pub fn remove(&mut self, id: &str) {
    self.employees.retain(|e| e.id != id);
  }

  pub fn get(&self, id: &str) -> Option<&Employee> {
    self.employees.iter().find(|e| e.id == id)
  }

  pub fn clear(&mut self) {
    self.employees.clear();
  }

  pub fn as_slice(&self) -> &[Employee] {
    &self.employees
  }

  pub fn len(&self) -> usize {
    self.employees.len()
  }

  pub fn is_empty(&self) -> bool {
    self.employees.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::employee;

  #[test]
  fn test_replace_dedups_by_id() {
    let mut roster = Roster::default();
    roster.replace(vec![
      employee("1", "Ada"),
      employee("2", "Grace"),
      employee("1", "Augusta"),
    ]);

    assert_eq!(roster.len(), 2);
    assert_eq!(roster.as_slice()[0].first_name, "Augusta");
    assert_eq!(roster.as_slice()[1].first_name, "Grace");
  }

  #[test]
  fn test_upsert_and_remove() {
    let mut roster = Roster::default();
    roster.upsert(employee("1", "Ada"));
    roster.upsert(employee("1", "Augusta"));
    roster.upsert(employee("2", "Grace"));
    assert_eq!(roster.len(), 2);
    assert_eq!(roster.get("1").unwrap().first_name, "Augusta");

    roster.upsert(employee("2", "Hopper"));

    roster.remove("1");
    roster.remove("missing");
    assert_eq!(roster.len(), 1);
    assert_eq!(roster.get("2").unwrap().first_name, "Hopper");
  }

  #[test]
  fn test_replace_existing_never_appends() {
    let mut roster = Roster::default();
    assert!(!roster.replace_existing(employee("1", "Ada")));
    assert!(roster.is_empty());

    roster.upsert(employee("1", "Ada"));
    roster.upsert(employee("2", "Grace"));
    assert!(roster.replace_existing(employee("2", "Hopper")));
    assert_eq!(roster.len(), 2);
    assert_eq!(roster.as_slice()[1].first_name, "Hopper");
  }
}
