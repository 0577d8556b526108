//! Command-line subcommands.

use clap::{Args, Subcommand};

use crate::remote::{Employee, NewEmployee};

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Log in with ROSTERSYNC_PASSWORD and remember the session token
  Login,
  /// Forget the session token
  Logout,
  /// Show session and cache service status
  Status,
  /// Show the roster, from the encrypted cache when possible
  #[command(alias = "ls")]
  List,
  /// Fetch the roster from the server and refresh the cache
  Fetch,
  /// Check whether the server has changes newer than the local roster
  Check,
  /// Add an employee
  Add(NewEmployeeArgs),
  /// Change fields of an existing employee
  Update(UpdateEmployeeArgs),
  /// Remove an employee
  #[command(alias = "rm")]
  Remove {
    id: String,
  },
  /// Keep the roster fresh, polling the server for changes
  Watch,
  /// Forget the local roster
  ClearCache {
    /// Also delete the roster entry from the cache service
    #[arg(long)]
    remote: bool,
    /// Delete every entry on the cache service
    #[arg(long, conflicts_with = "remote")]
    all: bool,
  },
}

#[derive(Args, Debug)]
pub struct NewEmployeeArgs {
  #[arg(long)]
  pub first_name: String,
  #[arg(long)]
  pub last_name: String,
  #[arg(long)]
  pub email: String,
  #[arg(long)]
  pub position: String,
  #[arg(long)]
  pub department: Option<String>,
  #[arg(long)]
  pub phone: Option<String>,
  #[arg(long)]
  pub hire_date: Option<String>,
}

impl From<NewEmployeeArgs> for NewEmployee {
  fn from(args: NewEmployeeArgs) -> Self {
    NewEmployee {
      first_name: args.first_name,
      last_name: args.last_name,
      email: args.email,
      position: args.position,
      department: args.department,
      phone: args.phone,
      hire_date: args.hire_date,
    }
  }
}

#[derive(Args, Debug)]
pub struct UpdateEmployeeArgs {
  pub id: String,
  #[arg(long)]
  pub first_name: Option<String>,
  #[arg(long)]
  pub last_name: Option<String>,
  #[arg(long)]
  pub email: Option<String>,
  #[arg(long)]
  pub position: Option<String>,
  #[arg(long)]
  pub department: Option<String>,
  #[arg(long)]
  pub phone: Option<String>,
  #[arg(long)]
  pub hire_date: Option<String>,
}

impl UpdateEmployeeArgs {
  /// Overlay the given fields on `employee`.
  pub fn apply(self, mut employee: Employee) -> Employee {
    if let Some(v) = self.first_name {
      employee.first_name = v;
    }
    if let Some(v) = self.last_name {
      employee.last_name = v;
    }
    if let Some(v) = self.email {
      employee.email = v;
    }
    if let Some(v) = self.position {
      employee.position = v;
    }
    if self.department.is_some() {
      employee.department = self.department;
    }
    if self.phone.is_some() {
      employee.phone = self.phone;
    }
    if self.hire_date.is_some() {
      employee.hire_date = self.hire_date;
    }
    employee
  }
}
