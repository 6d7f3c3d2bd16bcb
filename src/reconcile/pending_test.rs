//! Tests for pending evaluation and terminal states.

use serde_json::json;

use crate::invoker::{PendingKwargs, PendingPredicate};
use crate::reconcile::{
  DEFAULT_MAX_PENDING_RERUNS, MAX_RERUNS_WO_CHANGE, PendingVerdict, default_is_pending, evaluate,
  terminal_state,
};
use crate::types::{ChunkResult, TerminalState};

fn counters(wo: u32, reruns: u32) -> PendingKwargs {
  PendingKwargs {
    reruns_wo_change_count: wo,
    reruns_count: reruns,
    max_pending_reruns: DEFAULT_MAX_PENDING_RERUNS,
  }
}

#[test]
fn default_rule() {
  assert!(!default_is_pending(&ChunkResult::success("ok")));
  assert!(default_is_pending(&ChunkResult::failure("x")));
  assert!(default_is_pending(
    &ChunkResult::success("ok").with_changes(json!({"new": 1}))
  ));
  assert!(default_is_pending(&ChunkResult::pending("wait", json!({"poll": 1}))));
  // empty rerun data is no rerun data
  assert!(!default_is_pending(&{
    let mut r = ChunkResult::success("ok");
    r.rerun_data = Some(json!({}));
    r
  }));

  let mut recreating = ChunkResult::success("ok").with_changes(json!({"new": 1}));
  recreating.recreation_flow = true;
  assert!(!default_is_pending(&recreating));
  recreating.result = false;
  assert!(default_is_pending(&recreating));
}

#[test]
fn default_evaluation_order() {
  let ok = ChunkResult::success("ok");
  let failed = ChunkResult::failure("x");
  assert_eq!(evaluate(&ok, &counters(5, 700), None), PendingVerdict::Settled);
  assert_eq!(evaluate(&failed, &counters(0, 0), None), PendingVerdict::Pending);
  assert_eq!(
    evaluate(&failed, &counters(MAX_RERUNS_WO_CHANGE, 0), None),
    PendingVerdict::Stalled
  );
  assert_eq!(
    evaluate(&failed, &counters(0, DEFAULT_MAX_PENDING_RERUNS), None),
    PendingVerdict::CeilingExceeded
  );
}

#[test]
fn custom_predicate_is_bounded() {
  let always = |_: &ChunkResult, _: &PendingKwargs| true;
  let never = |_: &ChunkResult, _: &PendingKwargs| false;
  let failed = ChunkResult::failure("x");
  let ok = ChunkResult::success("ok");

  assert_eq!(evaluate(&ok, &counters(9, 0), Some(&always)), PendingVerdict::Pending);
  assert_eq!(evaluate(&failed, &counters(2, 0), Some(&always)), PendingVerdict::Pending);
  assert_eq!(evaluate(&failed, &counters(3, 0), Some(&always)), PendingVerdict::Stalled);
  assert_eq!(
    evaluate(&ok, &counters(0, DEFAULT_MAX_PENDING_RERUNS), Some(&always)),
    PendingVerdict::CeilingExceeded
  );
  assert_eq!(evaluate(&failed, &counters(0, 0), Some(&never)), PendingVerdict::Settled);
}

#[test]
fn predicate_sees_counters() {
  let below_two = |_: &ChunkResult, k: &PendingKwargs| k.reruns_count < 2;
  let predicate: &dyn PendingPredicate = &below_two;
  let ok = ChunkResult::success("ok");
  assert_eq!(evaluate(&ok, &counters(0, 1), Some(predicate)), PendingVerdict::Pending);
  assert_eq!(evaluate(&ok, &counters(0, 2), Some(predicate)), PendingVerdict::Settled);
}

#[test]
fn terminal_states() {
  let ok = ChunkResult::success("ok");
  let failed = ChunkResult::failure("x");
  let waiting = ChunkResult::pending("wait", json!({"poll": 1}));

  assert_eq!(terminal_state(&ok, None, false), TerminalState::Converged);
  assert_eq!(terminal_state(&failed, None, false), TerminalState::Failed);
  assert_eq!(
    terminal_state(&ok, Some(PendingVerdict::Settled), true),
    TerminalState::Converged
  );
  assert_eq!(
    terminal_state(&ok, Some(PendingVerdict::CeilingExceeded), true),
    TerminalState::Failed
  );
  assert_eq!(
    terminal_state(&failed, Some(PendingVerdict::Stalled), false),
    TerminalState::Failed
  );
  assert_eq!(
    terminal_state(&failed, Some(PendingVerdict::Stalled), true),
    TerminalState::Stalled
  );
  assert_eq!(
    terminal_state(&waiting, Some(PendingVerdict::Stalled), false),
    TerminalState::Stalled
  );
  assert_eq!(
    terminal_state(&ok, Some(PendingVerdict::Pending), false),
    TerminalState::Stalled
  );
}
