//! Reconciliation controller: re-runs pending chunks until they settle,
//! stall, or hit the rerun ceiling.

use std::collections::BTreeSet;

use serde_json::{Map, Value, json};
use tracing::{info, instrument};

use crate::gather::rerun_plan;
use crate::invoker::PendingKwargs;
use crate::run_state::RunState;
use crate::runtime::Runtime;
use crate::types::Tag;

mod pending;
#[cfg(test)]
mod pending_test;
mod wait;
#[cfg(test)]
mod wait_test;

pub use pending::{
  DEFAULT_MAX_PENDING_RERUNS, MAX_RERUNS_WO_CHANGE, PendingVerdict, default_is_pending, evaluate,
  terminal_state,
};
pub use wait::{WaitPolicy, delay_for};

/// Drives reruns over a [`Runtime`] until no chunk is pending.
#[derive(Debug, Clone)]
pub struct Reconciler {
  runtime: Runtime,
  max_pending_reruns: u32,
  default_wait: WaitPolicy,
}

impl Reconciler {
  pub fn new(runtime: Runtime, max_pending_reruns: u32, default_wait: WaitPolicy) -> Self {
    Self {
      runtime,
      max_pending_reruns,
      default_wait,
    }
  }

  /// Evaluates every result and returns the tags that must run again.
  /// Verdicts are recorded on the state.
  pub fn pending_tags(&self, state: &mut RunState) -> BTreeSet<Tag> {
    let registry = self.runtime.registry();
    let mut pending = BTreeSet::new();
    for (tag, result) in &state.running {
      let kwargs = PendingKwargs {
        reruns_wo_change_count: state.reruns_wo_change.get(tag).copied().unwrap_or(0),
        reruns_count: state.reruns.get(tag).copied().unwrap_or(0),
        max_pending_reruns: self.max_pending_reruns,
      };
      let verdict = evaluate(result, &kwargs, registry.pending_predicate(tag.state()));
      if verdict == PendingVerdict::Pending {
        pending.insert(tag.clone());
      }
      state.verdicts.insert(tag.clone(), verdict);
    }
    pending
  }

  /// Runs reruns until nothing is pending. Returns the number of reruns.
  #[instrument(level = "trace", skip(self, state))]
  pub async fn converge(&self, state: &mut RunState) -> u32 {
    let mut reruns = 0;
    loop {
      let pending = self.pending_tags(state);
      if pending.is_empty() {
        break;
      }
      let delay = delay_for(&pending, self.runtime.registry(), &self.default_wait, reruns);
      info!(
        rerun = reruns + 1,
        pending = pending.len(),
        delay_ms = delay.as_millis() as u64,
        "reconciling pending chunks"
      );
      if !delay.is_zero() {
        tokio::time::sleep(delay).await;
      }

      let plan = rerun_plan(&state.chunks, &state.running, &pending, &state.rerun_data);
      state.pass += 1;
      let outcome = self.runtime.run_pass(state, &plan.chunks, plan.carried).await;
      // A pending chunk that could not run this pass counts as unchanged.
      for tag in pending.iter().filter(|t| !outcome.completed.contains(*t)) {
        *state.reruns_wo_change.entry(tag.clone()).or_default() += 1;
        *state.reruns.entry(tag.clone()).or_default() += 1;
      }
      state.record_pass(outcome);
      reruns += 1;
    }
    if reruns > 0 {
      merge_history(state);
    }
    info!(reruns, "reconciliation finished");
    reruns
  }
}

/// Rewrites results of re-run chunks: comments from every pass without
/// duplicates, changes as the diff from the first old state to the last new state.
fn merge_history(state: &mut RunState) {
  for (tag, history) in &state.history {
    if history.len() < 2 {
      continue;
    }
    let (Some(first), Some(result)) = (history.first(), state.running.get_mut(tag)) else {
      continue;
    };
    let mut comments = vec![];
    for entry in history {
      for c in &entry.comment {
        if !comments.contains(c) {
          comments.push(c.clone());
        }
      }
    }
    result.comment = comments;
    let old = first.old_state.clone().unwrap_or(Value::Null);
    let new = result.new_state.clone().unwrap_or(Value::Null);
    result.changes = deep_diff(&old, &new);
  }
}

/// `{"old": .., "new": ..}` holding only what differs; `{}` when equal.
pub fn deep_diff(old: &Value, new: &Value) -> Value {
  match diff_parts(old, new) {
    (None, None) => json!({}),
    (o, n) => json!({
      "old": o.unwrap_or(Value::Null),
      "new": n.unwrap_or(Value::Null),
    }),
  }
}

fn diff_parts(old: &Value, new: &Value) -> (Option<Value>, Option<Value>) {
  if old == new {
    return (None, None);
  }
  let (Value::Object(a), Value::Object(b)) = (old, new) else {
    return (Some(old.clone()), Some(new.clone()));
  };
  let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
  let (mut out_old, mut out_new) = (Map::new(), Map::new());
  for key in keys {
    match (a.get(key), b.get(key)) {
      (Some(x), Some(y)) => {
        let (dx, dy) = diff_parts(x, y);
        if let Some(dx) = dx {
          out_old.insert(key.clone(), dx);
        }
        if let Some(dy) = dy {
          out_new.insert(key.clone(), dy);
        }
      }
      (Some(x), None) => {
        out_old.insert(key.clone(), x.clone());
      }
      (None, Some(y)) => {
        out_new.insert(key.clone(), y.clone());
      }
      (None, None) => {}
    }
  }
  (Some(Value::Object(out_old)), Some(Value::Object(out_new)))
}
