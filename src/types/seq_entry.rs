//! Per-chunk scheduling state for one Sequencer invocation.

use std::collections::{BTreeMap, BTreeSet};

use super::{ArgBinding, Chunk, ChunkResult, RequisiteKind, Tag};

/// A requisite reference resolved against a completed chunk or a store entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ReqRet {
  pub kind: RequisiteKind,
  pub state: String,
  pub name: String,
  pub tag: Tag,
  pub ret: ChunkResult,
  pub args: Vec<ArgBinding>,
  /// Resolved from the External State Store rather than the current run.
  pub from_store: bool,
}

/// Scheduling state for a chunk that has not run yet.
#[derive(Debug, Clone, PartialEq)]
pub struct SeqEntry {
  pub chunk: Chunk,
  pub tag: Tag,
  pub reqrets: Vec<ReqRet>,
  pub unmet: BTreeSet<Tag>,
  pub errors: Vec<String>,
}

impl SeqEntry {
  pub fn new(chunk: Chunk) -> Self {
    let tag = chunk.tag();
    Self {
      chunk,
      tag,
      reqrets: vec![],
      unmet: BTreeSet::new(),
      errors: vec![],
    }
  }

  pub fn is_ready(&self) -> bool {
    self.unmet.is_empty()
  }

  /// Records an error once.
  pub fn add_error(&mut self, error: impl Into<String>) {
    let error = error.into();
    if !self.errors.contains(&error) {
      self.errors.push(error);
    }
  }

  /// True if a reqret for `(kind, tag)` has already been recorded.
  pub fn has_reqret(&self, kind: RequisiteKind, tag: &Tag) -> bool {
    self.reqrets.iter().any(|r| r.kind == kind && &r.tag == tag)
  }
}

/// Sequence map keyed by the chunk's position in the chunk list.
pub type SeqMap = BTreeMap<usize, SeqEntry>;
