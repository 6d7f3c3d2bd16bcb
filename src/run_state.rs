//! Per-run state threaded through the runtime and the reconciliation controller.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::instrument;

use crate::config::RunConfig;
use crate::invoker::OperationContext;
use crate::reconcile::PendingVerdict;
use crate::runtime::PassOutcome;
use crate::store::StateStore;
use crate::types::{Chunk, ChunkResult, Running, StallDiagnostic, Tag};

/// Everything one run owns. Created at the start of a run, mutated by every pass.
#[derive(Debug)]
pub struct RunState {
  pub config: RunConfig,
  pub chunks: Vec<Chunk>,
  /// Latest result per tag across all passes.
  pub running: Running,
  pub store: Box<dyn StateStore>,
  /// Context template; each executing chunk gets its own clone.
  pub context: OperationContext,
  /// Pass index: 0 for the initial pass, then one per rerun.
  pub pass: u32,
  /// Global operation counter, stamped onto results as `run_num`.
  pub run_num: u64,
  /// Operation calls per tag.
  pub executions: BTreeMap<Tag, u32>,
  pub reruns: BTreeMap<Tag, u32>,
  pub reruns_wo_change: BTreeMap<Tag, u32>,
  pub rerun_data: BTreeMap<Tag, Value>,
  /// Results per pass, oldest first.
  pub history: BTreeMap<Tag, Vec<ChunkResult>>,
  pub verdicts: BTreeMap<Tag, PendingVerdict>,
  pub stalls: Vec<StallDiagnostic>,
}

impl RunState {
  pub fn new(config: RunConfig, chunks: Vec<Chunk>, store: Box<dyn StateStore>) -> Self {
    let context = OperationContext {
      run_name: config.run_name.clone(),
      test: config.test,
      ..OperationContext::default()
    };
    Self {
      config,
      chunks,
      running: Running::new(),
      store,
      context,
      pass: 0,
      run_num: 0,
      executions: BTreeMap::new(),
      reruns: BTreeMap::new(),
      reruns_wo_change: BTreeMap::new(),
      rerun_data: BTreeMap::new(),
      history: BTreeMap::new(),
      verdicts: BTreeMap::new(),
      stalls: vec![],
    }
  }

  /// Sets the credential/profile data handed to every operation.
  pub fn with_acct(mut self, acct: Value) -> Self {
    self.context.acct = acct;
    self
  }

  /// Folds a finished pass into the run: latest results, retry counters,
  /// carried rerun data and history.
  #[instrument(level = "trace", skip(self, outcome))]
  pub fn record_pass(&mut self, outcome: PassOutcome) {
    for tag in &outcome.completed {
      let Some(new) = outcome.running.get(tag) else {
        continue;
      };
      if let Some(prev) = self.running.get(tag) {
        let unchanged = prev.result == new.result && prev.changes == new.changes;
        let wo = self.reruns_wo_change.entry(tag.clone()).or_default();
        *wo = if unchanged { *wo + 1 } else { 0 };
        *self.reruns.entry(tag.clone()).or_default() += 1;
      }
      match new.rerun_data.as_ref().filter(|_| new.has_rerun_data()) {
        Some(data) => {
          self.rerun_data.insert(tag.clone(), data.clone());
        }
        None => {
          self.rerun_data.remove(tag);
        }
      }
      self
        .history
        .entry(tag.clone())
        .or_default()
        .push(new.clone());
      self.running.insert(tag.clone(), new.clone());
    }
    if let Some(stall) = outcome.stall {
      self.stalls.push(stall);
    }
  }
}
