//! External State Store: results of previously-applied chunks, keyed by ESM tag.
//!
//! The store is consulted read-only by the sequencer. Only the runtime
//! coordinator writes to it, and only for the tag of the chunk it just ran.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::error::StoreError;
use crate::types::{Chunk, EsmEntry, Tag};

mod local;
#[cfg(test)]
mod local_test;
#[cfg(test)]
mod memory_test;

pub use local::{ESM_SUBDIR, LocalStore};

/// Persisted, run-scoped key/value store of applied states.
pub trait StateStore: Send + Sync + fmt::Debug {
  /// Entries keyed by ESM tag.
  fn entries(&self) -> &BTreeMap<Tag, Value>;

  fn entries_mut(&mut self) -> &mut BTreeMap<Tag, Value>;

  /// Writes pending changes to durable storage.
  fn flush(&mut self) -> Result<(), StoreError>;

  /// First entry (in tag order) matching `state` and a declared name or id.
  fn get(&self, state: &str, name: &str) -> Option<EsmEntry> {
    self
      .entries()
      .iter()
      .filter_map(|(tag, value)| EsmEntry::from_tag(tag.clone(), value.clone()))
      .find(|e| e.matches(state, name))
  }

  fn get_by_tag(&self, tag: &Tag) -> Option<EsmEntry> {
    let value = self.entries().get(tag)?;
    EsmEntry::from_tag(tag.clone(), value.clone())
  }

  /// Converts a stored entry into a synthetic `present` chunk.
  fn as_chunk(&self, entry: &EsmEntry) -> Chunk {
    let mut chunk = Chunk::new(&entry.state, &entry.id, &entry.name, "present");
    if let Value::Object(map) = &entry.new_state {
      chunk.kwargs = map.clone();
    }
    chunk
  }

  fn put(&mut self, tag: Tag, new_state: Value) {
    self.entries_mut().insert(tag, new_state);
  }

  fn remove(&mut self, tag: &Tag) -> Option<Value> {
    self.entries_mut().remove(tag)
  }

  /// Drops the resource handle of a stored entry so the next pass recreates it.
  /// Returns whether a handle was removed.
  fn clear_resource_id(&mut self, tag: &Tag) -> bool {
    match self.entries_mut().get_mut(tag) {
      Some(Value::Object(map)) => map.remove("resource_id").is_some(),
      _ => false,
    }
  }

  fn snapshot(&self) -> BTreeMap<Tag, Value> {
    self.entries().clone()
  }
}

/// In-memory store for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  entries: BTreeMap<Tag, Value>,
  flushes: usize,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_entry(mut self, tag: impl Into<Tag>, new_state: Value) -> Self {
    self.entries.insert(tag.into(), new_state);
    self
  }

  /// Number of times [`StateStore::flush`] was called.
  pub fn flushes(&self) -> usize {
    self.flushes
  }
}

impl StateStore for MemoryStore {
  fn entries(&self) -> &BTreeMap<Tag, Value> {
    &self.entries
  }

  fn entries_mut(&mut self) -> &mut BTreeMap<Tag, Value> {
    &mut self.entries
  }

  fn flush(&mut self) -> Result<(), StoreError> {
    self.flushes += 1;
    Ok(())
  }
}
