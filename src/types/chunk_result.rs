//! Result of executing a single chunk's operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one operation call.
///
/// "Pending" is not a separate flag: it is `result == false` with non-empty
/// `rerun_data`. A plain failure has `result == false` and no `rerun_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkResult {
  pub name: String,
  #[serde(rename = "__id__", default)]
  pub id: String,
  pub result: bool,
  #[serde(default)]
  pub comment: Vec<String>,
  #[serde(default = "empty_object")]
  pub changes: Value,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub old_state: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub new_state: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub rerun_data: Option<Value>,
  #[serde(default)]
  pub force_save: bool,
  /// Set by operations that are re-creating a resource found missing.
  #[serde(default)]
  pub recreation_flow: bool,
  /// Global execution order within the run.
  #[serde(default)]
  pub run_num: u64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub started_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub total_seconds: f64,
}

fn empty_object() -> Value {
  Value::Object(Default::default())
}

impl ChunkResult {
  pub fn success(comment: impl Into<String>) -> Self {
    Self::with_result(true, comment)
  }

  pub fn failure(comment: impl Into<String>) -> Self {
    Self::with_result(false, comment)
  }

  /// A "not yet converged" result carrying retry metadata.
  pub fn pending(comment: impl Into<String>, rerun_data: Value) -> Self {
    let mut r = Self::with_result(false, comment);
    r.rerun_data = Some(rerun_data);
    r
  }

  fn with_result(result: bool, comment: impl Into<String>) -> Self {
    let comment = comment.into();
    Self {
      name: String::new(),
      id: String::new(),
      result,
      comment: if comment.is_empty() { vec![] } else { vec![comment] },
      changes: empty_object(),
      old_state: None,
      new_state: None,
      rerun_data: None,
      force_save: false,
      recreation_flow: false,
      run_num: 0,
      started_at: None,
      total_seconds: 0.0,
    }
  }

  pub fn with_changes(mut self, changes: Value) -> Self {
    self.changes = changes;
    self
  }

  pub fn with_states(mut self, old_state: Option<Value>, new_state: Option<Value>) -> Self {
    self.old_state = old_state;
    self.new_state = new_state;
    self
  }

  pub fn has_changes(&self) -> bool {
    is_truthy(&self.changes)
  }

  pub fn has_rerun_data(&self) -> bool {
    self.rerun_data.as_ref().is_some_and(is_truthy)
  }

  /// Appends a comment unless it is already present.
  pub fn add_comment(&mut self, comment: impl Into<String>) {
    let comment = comment.into();
    if !self.comment.contains(&comment) {
      self.comment.push(comment);
    }
  }
}

/// Truthiness of a JSON value: null, false, zero, and empty strings/arrays/objects are falsy.
pub fn is_truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
    Value::String(s) => !s.is_empty(),
    Value::Array(a) => !a.is_empty(),
    Value::Object(o) => !o.is_empty(),
  }
}
