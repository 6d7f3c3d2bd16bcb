//! Straight-requisite stage: resolves requisites against the current chunk list.

use tracing::{debug, warn};

use super::{SeqInput, SeqStage};
use crate::types::{ReqRet, SeqMap, find};

/// Resolves every non-prerequisite, non-sensitive, non-recreating requisite
/// kind within the current run. Unmatched references are left for the
/// cross-run stage when the kind consults the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct StraightStage;

impl SeqStage for StraightStage {
  fn name(&self) -> &'static str {
    "straight"
  }

  fn apply(&self, seq: &mut SeqMap, input: &SeqInput<'_>) {
    let fallback_kinds: Vec<String> = input
      .catalog
      .definitions()
      .filter(|d| d.consults_store)
      .map(|d| format!("'{}'", d.kind))
      .collect();

    for entry in seq.values_mut() {
      for def in input
        .catalog
        .definitions()
        .filter(|d| d.is_sensitive || d.forces_recreate)
      {
        if !entry.chunk.requisites_of(def.kind).is_empty() {
          debug!(
            tag = %entry.tag,
            kind = %def.kind,
            "requisite kind has no ordering effect, skipped"
          );
        }
      }
      for def in input.catalog.definitions().filter(|d| d.is_straight()) {
        for reference in entry.chunk.requisites_of(def.kind).to_vec() {
          for target in &reference.targets {
            let matches = find(input.chunks, &reference.state, &target.name);
            if matches.is_empty() {
              let error = if !def.consults_store {
                format!(
                  "Invalid requisite '{} {}:{}'. Expected {}.",
                  def.kind,
                  reference.state,
                  target.name,
                  fallback_kinds.join(" or ")
                )
              } else if input.skip_store.contains(&reference.state) {
                format!(
                  "Requisite '{} {}:{}' not found in current run. Verify the syntax.",
                  def.kind, reference.state, target.name
                )
              } else {
                continue;
              };
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
                  if !entry.has_reqret(def.kind, &found_tag) {
                    entry.reqrets.push(ReqRet {
                      kind: def.kind,
                      state: reference.state.clone(),
                      name: target.name.clone(),
                      tag: found_tag,
                      ret: ret.clone(),
                      args: target.args.clone(),
                      from_store: false,
                    });
                  }
                }
                None => {
                  entry.unmet.insert(found_tag);
                }
              }
            }
          }
        }
      }
    }
  }
}
