//! A previously-applied chunk's last known state, as held by the External State Store.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ChunkResult, Tag};

/// Last-known state of a resource applied by an earlier run, keyed by ESM tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsmEntry {
  pub tag: Tag,
  pub state: String,
  #[serde(rename = "__id__")]
  pub id: String,
  pub name: String,
  pub new_state: Value,
}

impl EsmEntry {
  /// Builds an entry from an ESM tag and the stored state. `None` for malformed tags.
  pub fn from_tag(tag: Tag, new_state: Value) -> Option<Self> {
    let (state, id, name) = tag.components()?;
    let (state, id, name) = (state.to_string(), id.to_string(), name.to_string());
    Some(Self {
      tag,
      state,
      id,
      name,
      new_state,
    })
  }

  /// Identifying handle of the managed resource, if recorded.
  pub fn resource_id(&self) -> Option<&str> {
    self
      .new_state
      .get("resource_id")
      .and_then(Value::as_str)
      .filter(|s| !s.is_empty())
  }

  /// True if this entry answers a requisite on `state`/`name` (name or id).
  pub fn matches(&self, state: &str, name: &str) -> bool {
    self.state == state && (self.name == name || self.id == name)
  }

  /// Presents the stored state as an already-satisfied successful result.
  pub fn as_result(&self) -> ChunkResult {
    let mut r = ChunkResult::success("Loaded from ESM");
    r.name = self.name.clone();
    r.id = self.id.clone();
    r.new_state = Some(self.new_state.clone());
    r.old_state = Some(self.new_state.clone());
    r
  }
}
