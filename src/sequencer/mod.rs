//! Sequencer: ordered pipeline of rule stages producing the sequence map.
//!
//! Every stage receives the in-progress [`SeqMap`] and may only add reqrets,
//! add to `unmet` and add errors. Stage order matters: cross-run resolution
//! depends on the straight stage having skipped unmatched references, and the
//! unique stage must see final requisite ordering before adding its own edges.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{debug, instrument};

use crate::catalog::RequisiteCatalog;
use crate::store::StateStore;
use crate::types::{Chunk, Running, SeqEntry, SeqMap, Tag};

mod prereq;
#[cfg(test)]
mod prereq_test;
mod store;
mod straight;
mod unique;

pub use prereq::PrereqStage;
pub use store::StoreStage;
pub use straight::StraightStage;
pub use unique::UniqueStage;

/// Everything a stage may read.
#[derive(Clone, Copy)]
pub struct SeqInput<'a> {
  pub chunks: &'a [Chunk],
  pub running: &'a Running,
  pub store: &'a dyn StateStore,
  pub catalog: &'a RequisiteCatalog,
  /// States whose requisites never fall back to the store.
  pub skip_store: &'a BTreeSet<String>,
}

impl fmt::Debug for SeqInput<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SeqInput")
      .field("chunks", &self.chunks.len())
      .field("running", &self.running.len())
      .finish_non_exhaustive()
  }
}

/// One rule stage of the pipeline.
pub trait SeqStage: Send + Sync + fmt::Debug {
  fn name(&self) -> &'static str;

  fn apply(&self, seq: &mut SeqMap, input: &SeqInput<'_>);
}

/// Runs its stages in order over the not-yet-run chunks.
#[derive(Debug)]
pub struct Sequencer {
  stages: Vec<Box<dyn SeqStage>>,
}

impl Sequencer {
  pub fn new(stages: Vec<Box<dyn SeqStage>>) -> Self {
    Self { stages }
  }

  /// Straight, cross-run, prerequisite, unique.
  pub fn standard() -> Self {
    Self::new(vec![
      Box::new(StraightStage),
      Box::new(StoreStage),
      Box::new(PrereqStage),
      Box::new(UniqueStage),
    ])
  }

  /// Inserts a stage ahead of the unique stage, which must stay last.
  pub fn with_stage(mut self, stage: Box<dyn SeqStage>) -> Self {
    let at = self
      .stages
      .iter()
      .position(|s| s.name() == UniqueStage.name())
      .unwrap_or(self.stages.len());
    self.stages.insert(at, stage);
    self
  }

  pub fn stage_names(&self) -> Vec<&'static str> {
    self.stages.iter().map(|s| s.name()).collect()
  }

  /// Builds the sequence map for every chunk whose tag is not in `running`.
  #[instrument(level = "trace", skip(self, input))]
  pub fn run(&self, input: &SeqInput<'_>) -> SeqMap {
    let mut seq = SeqMap::new();
    for (i, chunk) in input.chunks.iter().enumerate() {
      if !input.running.contains_key(&chunk.tag()) {
        seq.insert(i, SeqEntry::new(chunk.clone()));
      }
    }
    for stage in &self.stages {
      stage.apply(&mut seq, input);
      debug!(stage = stage.name(), entries = seq.len(), "sequencer stage applied");
    }
    seq
  }
}

impl Default for Sequencer {
  fn default() -> Self {
    Self::standard()
  }
}

/// Tag to map key for the entries in `seq`.
pub(crate) fn index_by_tag(seq: &SeqMap) -> BTreeMap<Tag, usize> {
  seq.iter().map(|(i, e)| (e.tag.clone(), *i)).collect()
}

/// True if `to` is reachable from `from` by following `unmet` edges.
pub(crate) fn reaches(seq: &SeqMap, by_tag: &BTreeMap<Tag, usize>, from: &Tag, to: &Tag) -> bool {
  let mut seen = BTreeSet::new();
  let mut stack = vec![from.clone()];
  while let Some(t) = stack.pop() {
    if !seen.insert(t.clone()) {
      continue;
    }
    let Some(entry) = by_tag.get(&t).and_then(|i| seq.get(i)) else {
      continue;
    };
    for dep in &entry.unmet {
      if dep == to {
        return true;
      }
      stack.push(dep.clone());
    }
  }
  false
}
