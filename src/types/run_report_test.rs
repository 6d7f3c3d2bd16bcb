//! Tests for `RunReport` and `StallDiagnostic`.

use std::collections::BTreeMap;

use chrono::Utc;

use super::{ChunkReport, RunReport, StallDiagnostic, Tag, TerminalState};

fn report(states: &[(&str, TerminalState)]) -> RunReport {
  let mut chunks = BTreeMap::new();
  for (t, s) in states {
    chunks.insert(
      Tag::from(*t),
      ChunkReport {
        tag: Tag::from(*t),
        terminal: *s,
        result: None,
        errors: vec![],
        comments: vec![],
        executions: 1,
      },
    );
  }
  RunReport {
    run_name: "r".to_string(),
    started_at: Utc::now(),
    finished_at: Utc::now(),
    reruns: 0,
    chunks,
    stalls: vec![],
  }
}

#[test]
fn counts_and_convergence() {
  let r = report(&[("a", TerminalState::Converged), ("b", TerminalState::Failed)]);
  assert_eq!(r.count(TerminalState::Converged), 1);
  assert_eq!(r.count(TerminalState::Failed), 1);
  assert!(!r.is_converged());
  assert_eq!(r.terminal(&Tag::from("b")), Some(TerminalState::Failed));

  let ok = report(&[("a", TerminalState::Converged)]);
  assert!(ok.is_converged());
}

#[test]
fn terminal_state_display() {
  assert_eq!(TerminalState::Converged.to_string(), "converged");
  assert_eq!(TerminalState::Failed.to_string(), "failed");
  assert_eq!(TerminalState::Stalled.to_string(), "stalled");
}

#[test]
fn stall_message_lists_unmet_graph() {
  let mut d = StallDiagnostic::default();
  d.unmet.insert(Tag::from("a"), vec![Tag::from("b")]);
  d.unmet.insert(Tag::from("b"), vec![Tag::from("a")]);
  assert_eq!(
    d.message(),
    "No sequence changed. Check for possible circular dependencies: a -> [b]; b -> [a]"
  );
}
