//! Unique stage: serializes chunks sharing a `unique` `(state, fun)`.
//!
//! Must run last. Exactly one member of each group is left free; every other
//! member is made to wait for it.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::{SeqInput, SeqStage, index_by_tag, reaches};
use crate::types::{FunctionRef, SeqMap, Tag};

#[derive(Debug, Clone, Copy, Default)]
pub struct UniqueStage;

impl SeqStage for UniqueStage {
  fn name(&self) -> &'static str {
    "unique"
  }

  fn apply(&self, seq: &mut SeqMap, input: &SeqInput<'_>) {
    let mut groups: BTreeMap<FunctionRef, Vec<usize>> = BTreeMap::new();
    for (&i, entry) in seq.iter() {
      if input.catalog.is_unique(&entry.chunk) {
        groups
          .entry(entry.chunk.function_ref())
          .or_default()
          .push(i);
      }
    }

    for (function, members) in groups {
      if members.len() < 2 {
        continue;
      }
      let by_tag = index_by_tag(seq);
      let Some(free) = select_free(seq, &by_tag, &members) else {
        continue;
      };
      let free_tag = seq[&free].tag.clone();
      debug!(%function, free = %free_tag, members = members.len(), "unique group serialized");
      for &other in members.iter().filter(|&&m| m != free) {
        let other_tag = seq[&other].tag.clone();
        if reaches(seq, &by_tag, &free_tag, &other_tag) {
          continue;
        }
        if let Some(entry) = seq.get_mut(&other) {
          entry.unmet.insert(free_tag.clone());
        }
      }
    }
  }
}

/// Picks the member allowed to run first.
///
/// Ranking, lowest wins: empty `unmet`; does not wait (even transitively) on
/// another member; not waited on by another member; shallowest `unmet` chain;
/// position in the chunk list.
fn select_free(seq: &SeqMap, by_tag: &BTreeMap<Tag, usize>, members: &[usize]) -> Option<usize> {
  let tags: Vec<Tag> = members.iter().map(|m| seq[m].tag.clone()).collect();
  let mut depths = BTreeMap::new();
  members
    .iter()
    .zip(&tags)
    .map(|(&m, tag)| {
      let others = || tags.iter().filter(move |t| *t != tag);
      let has_unmet = !seq[&m].unmet.is_empty();
      let waits_on_group = others().any(|t| reaches(seq, by_tag, tag, t));
      let waited_on = others().any(|t| reaches(seq, by_tag, t, tag));
      let depth = depth(seq, by_tag, tag, &mut depths, &mut BTreeSet::new());
      ((has_unmet, waits_on_group, waited_on, depth, m), m)
    })
    .min_by(|a, b| a.0.cmp(&b.0))
    .map(|(_, m)| m)
}

/// Longest `unmet` chain below `tag`; cycles count as already visited.
fn depth(
  seq: &SeqMap,
  by_tag: &BTreeMap<Tag, usize>,
  tag: &Tag,
  memo: &mut BTreeMap<Tag, usize>,
  visiting: &mut BTreeSet<Tag>,
) -> usize {
  if let Some(d) = memo.get(tag) {
    return *d;
  }
  if !visiting.insert(tag.clone()) {
    return 0;
  }
  let d = match by_tag.get(tag).and_then(|i| seq.get(i)) {
    Some(entry) => entry
      .unmet
      .iter()
      .map(|dep| 1 + depth(seq, by_tag, dep, memo, visiting))
      .max()
      .unwrap_or(0),
    None => 0,
  };
  visiting.remove(tag);
  memo.insert(tag.clone(), d);
  d
}
