//! Prerequisite stage.
//!
//! A chunk X declaring `prereq` on T waits for T. Any other chunk that waits on T
//! through a non-prereq requisite (or holds T's result) is made to wait for X as
//! well, unless that edge would close a cycle.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use super::{SeqInput, SeqStage, index_by_tag, reaches};
use crate::types::{ReqRet, SeqMap, Tag, find};

#[derive(Debug, Clone, Copy, Default)]
pub struct PrereqStage;

impl SeqStage for PrereqStage {
  fn name(&self) -> &'static str {
    "prereq"
  }

  fn apply(&self, seq: &mut SeqMap, input: &SeqInput<'_>) {
    let prereq_kinds: Vec<_> = input
      .catalog
      .definitions()
      .filter(|d| d.is_prereq)
      .map(|d| d.kind)
      .collect();

    let direct: BTreeMap<usize, BTreeSet<Tag>> =
      seq.iter().map(|(&i, e)| (i, e.unmet.clone())).collect();

    // (declarer index, declarer tag, target tag)
    let mut edges: Vec<(usize, Tag, Tag)> = vec![];
    for (&i, entry) in seq.iter_mut() {
      for &kind in &prereq_kinds {
        for reference in entry.chunk.requisites_of(kind).to_vec() {
          for target in &reference.targets {
            let matches = find(input.chunks, &reference.state, &target.name);
            if matches.is_empty() {
              let error = format!(
                "Requisite {} {}:{} not found in current run.",
                kind, reference.state, target.name
              );
              warn!(tag = %entry.tag, %error, "requisite resolution failed");
              entry.add_error(error);
              continue;
            }
            for found in matches {
              let found_tag = found.tag();
              if found_tag == entry.tag {
                continue;
              }
              match input.running.get(&found_tag) {
                Some(ret) => {
                  if !entry.has_reqret(kind, &found_tag) {
                    entry.reqrets.push(ReqRet {
                      kind,
                      state: reference.state.clone(),
                      name: target.name.clone(),
                      tag: found_tag.clone(),
                      ret: ret.clone(),
                      args: vec![],
                      from_store: false,
                    });
                  }
                }
                None => {
                  entry.unmet.insert(found_tag.clone());
                }
              }
              edges.push((i, entry.tag.clone(), found_tag));
            }
          }
        }
      }
    }

    // Only waits that came from other requisite kinds count as downstream of T,
    // so co-declarers of one target never wait on each other.
    let mut additions: Vec<(usize, Tag)> = vec![];
    for (declarer, declarer_tag, target) in &edges {
      for (&j, other) in seq.iter() {
        if j == *declarer {
          continue;
        }
        let waits_on_target = direct.get(&j).is_some_and(|d| d.contains(target))
          || other
            .reqrets
            .iter()
            .any(|r| &r.tag == target && !prereq_kinds.contains(&r.kind));
        if waits_on_target {
          additions.push((j, declarer_tag.clone()));
        }
      }
    }
    let by_tag = index_by_tag(seq);
    for (j, declarer_tag) in additions {
      let Some(other_tag) = seq.get(&j).map(|e| e.tag.clone()) else {
        continue;
      };
      if reaches(seq, &by_tag, &declarer_tag, &other_tag) {
        debug!(
          tag = %other_tag,
          prereq = %declarer_tag,
          "skipping prereq edge that would close a cycle"
        );
        continue;
      }
      if let Some(entry) = seq.get_mut(&j) {
        entry.unmet.insert(declarer_tag);
      }
    }
  }
}
