//! Engine: one run from chunk list to report.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::catalog::RequisiteCatalog;
use crate::config::RunConfig;
use crate::error::{EngineError, StoreError};
use crate::gather::target_chunks;
use crate::invoker::OperationRegistry;
use crate::reconcile::{Reconciler, terminal_state};
use crate::report_io::{read_report, write_report};
use crate::run_state::RunState;
use crate::runtime::Runtime;
use crate::sequencer::Sequencer;
use crate::store::{LocalStore, MemoryStore, StateStore};
use crate::types::{Chunk, ChunkReport, RunReport, Running, Tag, TerminalState};

/// Registry, catalog and sequencer shared by every run.
#[derive(Debug, Clone)]
pub struct Engine {
  registry: Arc<OperationRegistry>,
  catalog: Arc<RequisiteCatalog>,
  sequencer: Arc<Sequencer>,
}

impl Engine {
  /// Standard catalog, extended with the registry's unique functions.
  pub fn new(registry: OperationRegistry) -> Self {
    let mut catalog = RequisiteCatalog::standard();
    for function in registry.unique_functions() {
      catalog.mark_unique(function.clone());
    }
    Self {
      registry: Arc::new(registry),
      catalog: Arc::new(catalog),
      sequencer: Arc::new(Sequencer::standard()),
    }
  }

  pub fn with_catalog(mut self, mut catalog: RequisiteCatalog) -> Self {
    for function in self.registry.unique_functions() {
      catalog.mark_unique(function.clone());
    }
    self.catalog = Arc::new(catalog);
    self
  }

  pub fn with_sequencer(mut self, sequencer: Sequencer) -> Self {
    self.sequencer = Arc::new(sequencer);
    self
  }

  /// Opens the store a config asks for: the local file store under
  /// `cache_dir`, otherwise an empty in-memory store.
  pub fn open_store(config: &RunConfig) -> Result<Box<dyn StateStore>, StoreError> {
    Ok(match &config.cache_dir {
      Some(dir) => Box::new(LocalStore::open(dir, &config.run_name)?),
      None => Box::new(MemoryStore::new()),
    })
  }

  /// Report written by the previous run of `config.run_name`, if a cache dir
  /// is configured and a run has completed there.
  pub fn last_report(config: &RunConfig) -> Result<Option<RunReport>, EngineError> {
    match &config.cache_dir {
      Some(dir) => Ok(read_report(dir, &config.run_name)?),
      None => Ok(None),
    }
  }

  /// Opens the configured store and runs `chunks` to completion.
  pub async fn apply(
    &self,
    config: RunConfig,
    chunks: Vec<Chunk>,
  ) -> Result<RunReport, EngineError> {
    let store = Self::open_store(&config)?;
    let mut state = RunState::new(config, chunks, store);
    self.run(&mut state).await
  }

  /// Initial pass, then reconciliation unless disabled or in test mode, then
  /// a store flush. Per-chunk failures end up in the report.
  #[instrument(level = "trace", skip(self, state), fields(run_name = %state.config.run_name))]
  pub async fn run(&self, state: &mut RunState) -> Result<RunReport, EngineError> {
    let started_at = Utc::now();
    if state.chunks.is_empty() {
      return Err(EngineError::NoChunks);
    }
    let mut seen = BTreeSet::new();
    if let Some(dup) = state.chunks.iter().map(Chunk::tag).find(|t| !seen.insert(t.clone())) {
      return Err(EngineError::DuplicateTag(dup));
    }
    if let Some(target) = state.config.target.clone() {
      state.chunks = target_chunks(&state.chunks, &target);
      if state.chunks.is_empty() {
        return Err(EngineError::UnknownTarget(target));
      }
    }

    info!(chunks = state.chunks.len(), test = state.config.test, "starting run");
    let runtime = Runtime::new(
      self.registry.clone(),
      self.catalog.clone(),
      self.sequencer.clone(),
      state.config.batch_size,
    );
    let chunks = state.chunks.clone();
    let outcome = runtime.run_pass(state, &chunks, Running::new()).await;
    state.record_pass(outcome);

    let mut reruns = 0;
    if state.config.reconcile && !state.config.test {
      let reconciler = Reconciler::new(
        runtime,
        state.config.max_pending_reruns,
        state.config.default_wait.clone(),
      );
      reruns = reconciler.converge(state).await;
    }

    state.store.flush()?;
    let report = self.report(state, started_at, reruns);
    if let Some(dir) = &state.config.cache_dir {
      write_report(dir, &report)?;
    }
    info!(
      converged = report.count(TerminalState::Converged),
      failed = report.count(TerminalState::Failed),
      stalled = report.count(TerminalState::Stalled),
      reruns,
      "run finished"
    );
    Ok(report)
  }

  fn report(&self, state: &RunState, started_at: chrono::DateTime<Utc>, reruns: u32) -> RunReport {
    let mut chunks = BTreeMap::new();
    for chunk in &state.chunks {
      let tag = chunk.tag();
      let executions = state.executions.get(&tag).copied().unwrap_or(0);
      let report = match state.running.get(&tag) {
        Some(result) => {
          let custom = self.registry.pending_predicate(&chunk.state).is_some();
          let terminal = terminal_state(result, state.verdicts.get(&tag).copied(), custom);
          let errors = if result.result { vec![] } else { result.comment.clone() };
          ChunkReport {
            tag: tag.clone(),
            terminal,
            result: Some(result.clone()),
            errors,
            comments: result.comment.clone(),
            executions,
          }
        }
        None => {
          let errors = unresolved_errors(state, &tag);
          warn!(%tag, ?errors, "chunk never ran");
          ChunkReport {
            tag: tag.clone(),
            terminal: TerminalState::Failed,
            result: None,
            errors,
            comments: vec![],
            executions,
          }
        }
      };
      chunks.insert(tag, report);
    }
    RunReport {
      run_name: state.config.run_name.clone(),
      started_at,
      finished_at: Utc::now(),
      reruns,
      chunks,
      stalls: state.stalls.clone(),
    }
  }
}

/// Errors for a chunk left unmet by the latest stall that mentions it.
fn unresolved_errors(state: &RunState, tag: &Tag) -> Vec<String> {
  let Some(stall) = state.stalls.iter().rev().find(|s| s.unmet.contains_key(tag)) else {
    return vec!["Chunk was never scheduled".to_string()];
  };
  let mut errors: Vec<String> = stall.errors.get(tag).cloned().unwrap_or_default();
  let unmet: Vec<&str> = stall.unmet[tag].iter().map(Tag::as_str).collect();
  errors.push(format!("Unresolved requisites: {}", unmet.join(", ")));
  errors
}
