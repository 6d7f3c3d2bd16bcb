//! Per-tag "still pending" evaluation.

use crate::invoker::{PendingKwargs, PendingPredicate};
use crate::types::{ChunkResult, TerminalState};

/// Consecutive unchanged passes after which a chunk stops being retried.
pub const MAX_RERUNS_WO_CHANGE: u32 = 3;

/// Default ceiling on reconciliation reruns per chunk.
pub const DEFAULT_MAX_PENDING_RERUNS: u32 = 600;

/// Outcome of one pending evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingVerdict {
  /// Run again.
  Pending,
  /// Not pending; the result stands.
  Settled,
  /// Unchanged for `MAX_RERUNS_WO_CHANGE` passes.
  Stalled,
  /// Reached `max_pending_reruns`.
  CeilingExceeded,
}

/// Default rule used when the provider has no predicate of its own.
pub fn default_is_pending(result: &ChunkResult) -> bool {
  if result.recreation_flow {
    return !result.result;
  }
  if result.has_changes() || result.has_rerun_data() {
    return true;
  }
  !result.result
}

pub fn evaluate(
  result: &ChunkResult,
  kwargs: &PendingKwargs,
  custom: Option<&dyn PendingPredicate>,
) -> PendingVerdict {
  match custom {
    Some(predicate) => {
      if !result.result && kwargs.reruns_wo_change_count >= MAX_RERUNS_WO_CHANGE {
        PendingVerdict::Stalled
      } else if kwargs.reruns_count >= kwargs.max_pending_reruns {
        PendingVerdict::CeilingExceeded
      } else if predicate.is_pending(result, kwargs) {
        PendingVerdict::Pending
      } else {
        PendingVerdict::Settled
      }
    }
    None => {
      if !default_is_pending(result) {
        PendingVerdict::Settled
      } else if kwargs.reruns_wo_change_count >= MAX_RERUNS_WO_CHANGE {
        PendingVerdict::Stalled
      } else if kwargs.reruns_count >= kwargs.max_pending_reruns {
        PendingVerdict::CeilingExceeded
      } else {
        PendingVerdict::Pending
      }
    }
  }
}

/// Maps the last verdict for a chunk to its reported terminal state.
///
/// A plain failure that stopped changing is `Failed`; anything else that
/// stopped changing while still pending is `Stalled`.
pub fn terminal_state(
  result: &ChunkResult,
  verdict: Option<PendingVerdict>,
  custom: bool,
) -> TerminalState {
  match verdict {
    Some(PendingVerdict::CeilingExceeded) => TerminalState::Failed,
    Some(PendingVerdict::Stalled) | Some(PendingVerdict::Pending) => {
      if !custom && !result.result && !result.has_rerun_data() {
        TerminalState::Failed
      } else {
        TerminalState::Stalled
      }
    }
    Some(PendingVerdict::Settled) | None => {
      if result.result {
        TerminalState::Converged
      } else {
        TerminalState::Failed
      }
    }
  }
}
