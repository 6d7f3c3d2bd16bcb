//! Cross-run stage: resolves `require`/`arg_bind` references that are absent
//! from the current run against the External State Store.

use tracing::{debug, warn};

use super::{SeqInput, SeqStage};
use crate::types::{ReqRet, SeqMap, find};

#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStage;

impl SeqStage for StoreStage {
  fn name(&self) -> &'static str {
    "store"
  }

  fn apply(&self, seq: &mut SeqMap, input: &SeqInput<'_>) {
    for entry in seq.values_mut() {
      for def in input.catalog.definitions().filter(|d| d.consults_store) {
        for reference in entry.chunk.requisites_of(def.kind).to_vec() {
          if input.skip_store.contains(&reference.state) {
            continue;
          }
          for target in &reference.targets {
            if !find(input.chunks, &reference.state, &target.name).is_empty() {
              continue;
            }
            let Some(stored) = input.store.get(&reference.state, &target.name) else {
              let error = format!(
                "Requisite {} {}:{} not found in ESM.",
                def.kind, reference.state, target.name
              );
              warn!(tag = %entry.tag, %error, "requisite resolution failed");
              entry.add_error(error);
              continue;
            };
            let synthetic = input.store.as_chunk(&stored);
            let tag = synthetic.tag();
            if entry.has_reqret(def.kind, &tag) {
              continue;
            }
            debug!(tag = %entry.tag, from = %tag, "requisite resolved from store");
            entry.reqrets.push(ReqRet {
              kind: def.kind,
              state: reference.state.clone(),
              name: target.name.clone(),
              tag,
              ret: stored.as_result(),
              args: target.args.clone(),
              from_store: true,
            });
          }
        }
      }
    }
  }
}
