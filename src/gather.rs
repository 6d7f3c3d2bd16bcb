//! Chunk selection for reruns and targeted runs.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::{debug, instrument};

use crate::types::{Chunk, RequisiteKind, Running, Tag, find};

/// Indices of every chunk `roots` depend on through `require`/`arg_bind`,
/// followed recursively, roots included. Dependencies that are `present`
/// operations are left out: their results come from the store instead.
#[instrument(level = "trace", skip(chunks))]
pub fn gather_low_items(chunks: &[Chunk], roots: &[usize]) -> BTreeSet<usize> {
  let mut seen: BTreeSet<usize> = BTreeSet::new();
  let mut stack: Vec<usize> = roots.to_vec();
  let tags: BTreeMap<Tag, usize> = chunks.iter().enumerate().map(|(i, c)| (c.tag(), i)).collect();

  while let Some(i) = stack.pop() {
    if !seen.insert(i) {
      continue;
    }
    let Some(chunk) = chunks.get(i) else {
      continue;
    };
    for kind in [RequisiteKind::Require, RequisiteKind::ArgBind] {
      for reference in chunk.requisites_of(kind) {
        for target in &reference.targets {
          for dep in find(chunks, &reference.state, &target.name) {
            if dep.fun == "present" {
              continue;
            }
            if let Some(&j) = tags.get(&dep.tag()) {
              stack.push(j);
            }
          }
        }
      }
    }
  }
  seen
}

/// Chunks declared under `target` (by `__id__`) plus their gathered dependencies,
/// in list order.
pub fn target_chunks(chunks: &[Chunk], target: &str) -> Vec<Chunk> {
  let roots: Vec<usize> = chunks
    .iter()
    .enumerate()
    .filter(|(_, c)| c.id == target)
    .map(|(i, _)| i)
    .collect();
  let keep = gather_low_items(chunks, &roots);
  chunks
    .iter()
    .enumerate()
    .filter(|(i, _)| keep.contains(i))
    .map(|(_, c)| c.clone())
    .collect()
}

/// Input for one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct RerunPlan {
  /// Full chunk list for the pass; chunks to execute carry their rerun data.
  pub chunks: Vec<Chunk>,
  /// Results of chunks that are not re-executed, seeded into the pass.
  pub carried: Running,
  pub execute: BTreeSet<Tag>,
}

/// Re-executes the pending chunks, their gathered dependencies and any chunk
/// that never got a result; everything else is carried with its last result.
#[instrument(level = "trace", skip(chunks, running, rerun_data))]
pub fn rerun_plan(
  chunks: &[Chunk],
  running: &Running,
  pending: &BTreeSet<Tag>,
  rerun_data: &BTreeMap<Tag, Value>,
) -> RerunPlan {
  let roots: Vec<usize> = chunks
    .iter()
    .enumerate()
    .filter(|(_, c)| pending.contains(&c.tag()) || !running.contains_key(&c.tag()))
    .map(|(i, _)| i)
    .collect();
  let execute_idx = gather_low_items(chunks, &roots);

  let mut plan = RerunPlan::default();
  for (i, chunk) in chunks.iter().enumerate() {
    let tag = chunk.tag();
    let mut chunk = chunk.clone();
    if execute_idx.contains(&i) {
      chunk.rerun_data = rerun_data.get(&tag).cloned();
      plan.execute.insert(tag);
    } else if let Some(result) = running.get(&tag) {
      plan.carried.insert(tag, result.clone());
    }
    plan.chunks.push(chunk);
  }
  debug!(execute = plan.execute.len(), carried = plan.carried.len(), "rerun planned");
  plan
}
