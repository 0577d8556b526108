use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A roster record as served by the roster service.
///
/// Fields this client does not know about are kept in `extra` so that a
/// record survives a trip through the cache unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: String,
  #[serde(default)]
  pub first_name: String,
  #[serde(default)]
  pub last_name: String,
  #[serde(default)]
  pub email: String,
  #[serde(default)]
  pub position: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub department: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub hire_date: Option<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Employee {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
      .trim()
      .to_string()
  }
}

/// Ids arrive as strings from most backends, as numbers from some.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: serde::Deserializer<'de>,
{
  match Value::deserialize(deserializer)? {
    Value::String(s) => Ok(s),
    Value::Number(n) => Ok(n.to_string()),
    other => Err(serde::de::Error::custom(format!(
      "invalid employee id: {}",
      other
    ))),
  }
}

/// A record that has not been assigned an id yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEmployee {
  pub first_name: String,
  pub last_name: String,
  pub email: String,
  pub position: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub department: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub hire_date: Option<String>,
}

#[cfg(test)]
impl NewEmployee {
  /// Attach a server-assigned id.
  pub fn with_id(self, id: impl Into<String>) -> Employee {
    Employee {
      id: id.into(),
      first_name: self.first_name,
      last_name: self.last_name,
      email: self.email,
      position: self.position,
      department: self.department,
      phone: self.phone,
      hire_date: self.hire_date,
      extra: Map::new(),
    }
  }
}

/// The plaintext stored in the cache under the roster key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSnapshot {
  pub employees: Vec<Employee>,
  pub last_update: i64,
}
