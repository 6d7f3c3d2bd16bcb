//! Parallel batch runtime: sequences, executes ready chunks in bounded
//! batches and folds their results back until nothing more can run.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::catalog::RequisiteCatalog;
use crate::error::OperationError;
use crate::invoker::{OperationContext, OperationHandler, OperationRegistry};
use crate::rules::check_requisites;
use crate::run_state::RunState;
use crate::sequencer::{SeqInput, Sequencer};
use crate::types::{Chunk, ChunkResult, Kwargs, Running, SeqEntry, StallDiagnostic, Tag};

/// Result of one full pass over a chunk list.
#[derive(Debug, Clone, Default)]
pub struct PassOutcome {
  /// Initial results plus everything completed in this pass.
  pub running: Running,
  /// Tags that got a result in this pass, executed or not.
  pub completed: BTreeSet<Tag>,
  /// Set when the pass stopped with chunks left that could never become ready.
  pub stall: Option<StallDiagnostic>,
  /// Sequencer invocations that selected at least one chunk.
  pub iterations: u32,
}

/// A chunk that finished, sent from its task back to the coordinator.
#[derive(Debug)]
struct Completed {
  chunk: Chunk,
  tag: Tag,
  result: ChunkResult,
  run_num: u64,
  /// The operation was actually called (not failed or skipped beforehand).
  executed: bool,
  /// The `exists` check found the managed resource gone.
  resource_gone: bool,
}

/// A ready chunk, either settled before execution or handed to its handler.
enum Prepared {
  Done(ChunkResult),
  Run {
    handler: Arc<dyn OperationHandler>,
    ctx: OperationContext,
    kwargs: Kwargs,
  },
}

/// Drives passes. Cheap to clone; shares registry, catalog and sequencer.
#[derive(Debug, Clone)]
pub struct Runtime {
  registry: Arc<OperationRegistry>,
  catalog: Arc<RequisiteCatalog>,
  sequencer: Arc<Sequencer>,
  /// Concurrency limit; `<= 0` runs every ready chunk at once.
  batch_size: i64,
}

impl Runtime {
  pub fn new(
    registry: Arc<OperationRegistry>,
    catalog: Arc<RequisiteCatalog>,
    sequencer: Arc<Sequencer>,
    batch_size: i64,
  ) -> Self {
    Self {
      registry,
      catalog,
      sequencer,
      batch_size,
    }
  }

  pub fn registry(&self) -> &OperationRegistry {
    &self.registry
  }

  /// Runs `chunks` until every chunk has a result or no chunk can become ready.
  ///
  /// Chunks whose tag is already in `initial` are treated as done.
  #[instrument(level = "trace", skip(self, state, chunks, initial), fields(pass = state.pass))]
  pub async fn run_pass(
    &self,
    state: &mut RunState,
    chunks: &[Chunk],
    initial: Running,
  ) -> PassOutcome {
    let mut outcome = PassOutcome {
      running: initial,
      ..PassOutcome::default()
    };
    loop {
      let seq = self.sequencer.run(&SeqInput {
        chunks,
        running: &outcome.running,
        store: &*state.store,
        catalog: &self.catalog,
        skip_store: self.registry.skip_store_states(),
      });
      if seq.is_empty() {
        break;
      }
      let ready: Vec<SeqEntry> = seq.values().filter(|e| e.is_ready()).cloned().collect();
      if ready.is_empty() {
        let stall = StallDiagnostic {
          pass: state.pass,
          unmet: seq
            .values()
            .map(|e| (e.tag.clone(), e.unmet.iter().cloned().collect::<Vec<_>>()))
            .collect(),
          errors: seq
            .values()
            .filter(|e| !e.errors.is_empty())
            .map(|e| (e.tag.clone(), e.errors.clone()))
            .collect(),
        };
        warn!(pass = state.pass, remaining = seq.len(), "{}", stall.message());
        outcome.stall = Some(stall);
        break;
      }

      outcome.iterations += 1;
      let limit = if self.batch_size <= 0 {
        ready.len()
      } else {
        usize::try_from(self.batch_size).unwrap_or(usize::MAX)
      };
      info!(
        pass = state.pass,
        iteration = outcome.iterations,
        ready = ready.len(),
        remaining = seq.len(),
        "running ready chunks"
      );
      for batch in ready.chunks(limit.max(1)) {
        self.run_batch(state, batch, &mut outcome).await;
      }
    }
    outcome
  }

  /// Launches every chunk of the batch concurrently and waits for all of them.
  #[instrument(level = "trace", skip(self, state, batch, outcome), fields(size = batch.len()))]
  async fn run_batch(&self, state: &mut RunState, batch: &[SeqEntry], outcome: &mut PassOutcome) {
    let (tx, mut rx) = mpsc::channel::<Completed>(batch.len().max(1));
    let mut handles = vec![];
    let mut spawned = vec![];

    for entry in batch {
      state.run_num += 1;
      let run_num = state.run_num;
      match self.prepare(state, entry) {
        Prepared::Done(result) => self.merge(
          state,
          outcome,
          Completed {
            chunk: entry.chunk.clone(),
            tag: entry.tag.clone(),
            result,
            run_num,
            executed: false,
            resource_gone: false,
          },
        ),
        Prepared::Run {
          handler,
          ctx,
          kwargs,
        } => {
          let tx = tx.clone();
          let chunk = entry.chunk.clone();
          let tag = entry.tag.clone();
          spawned.push((chunk.clone(), tag.clone(), run_num));
          handles.push(tokio::spawn(async move {
            let (result, resource_gone) = execute(handler, ctx, &chunk, kwargs).await;
            let done = Completed {
              chunk,
              tag,
              result,
              run_num,
              executed: true,
              resource_gone,
            };
            if tx.send(done).await.is_err() {
              warn!("runtime coordinator dropped before chunk completed");
            }
          }));
        }
      }
    }
    drop(tx);

    // Merge each result as soon as its chunk returns.
    while let Some(done) = rx.recv().await {
      self.merge(state, outcome, done);
    }

    for ((chunk, tag, run_num), joined) in spawned.into_iter().zip(join_all(handles).await) {
      if let Err(e) = joined {
        if outcome.completed.contains(&tag) {
          continue;
        }
        let error = OperationError::Aborted(e.to_string());
        warn!(%tag, %error, "chunk task did not complete");
        self.merge(
          state,
          outcome,
          Completed {
            chunk,
            tag,
            result: ChunkResult::failure(error.to_string()),
            run_num,
            executed: true,
            resource_gone: false,
          },
        );
      }
    }
  }

  /// Applies requisite rules and looks up the handler for a ready chunk.
  fn prepare(&self, state: &RunState, entry: &SeqEntry) -> Prepared {
    let chunk = &entry.chunk;
    let mut kwargs = chunk.kwargs.clone();
    let check = check_requisites(entry, &mut kwargs);
    let errors: Vec<String> = entry
      .errors
      .iter()
      .chain(&check.errors)
      .cloned()
      .collect();
    if !errors.is_empty() {
      debug!(tag = %entry.tag, ?errors, "chunk failed before execution");
      let mut result = ChunkResult::failure("");
      for e in errors {
        result.add_comment(e);
      }
      return Prepared::Done(result);
    }
    if let Some(reason) = check.skip {
      return Prepared::Done(ChunkResult::success(reason));
    }
    let Some(handler) = self.registry.handler(&chunk.function_ref()) else {
      return Prepared::Done(ChunkResult::failure(format!(
        "Could not find function to enforce {}. \
         Please make sure that the corresponding plugin is loaded.",
        chunk.state
      )));
    };

    let mut ctx = state.context.clone();
    ctx.tag = Some(entry.tag.clone());
    ctx.rerun_data = chunk.rerun_data.clone();
    ctx.enforced_state = state.store.get_by_tag(&chunk.esm_tag()).map(|e| e.new_state);
    Prepared::Run {
      handler,
      ctx,
      kwargs,
    }
  }

  /// Folds one completed chunk into the pass and, for executed chunks, into the store.
  fn merge(&self, state: &mut RunState, outcome: &mut PassOutcome, done: Completed) {
    let Completed {
      chunk,
      tag,
      mut result,
      run_num,
      executed,
      resource_gone,
    } = done;
    result.name = chunk.name.clone();
    result.id = chunk.id.clone();
    result.run_num = run_num;

    if executed {
      *state.executions.entry(tag.clone()).or_default() += 1;
      let esm_tag = chunk.esm_tag();
      let skip_store = self.registry.skip_store_states().contains(&chunk.state);
      let write_back = result.result
        || result.force_save
        || (result.old_state.is_none() && result.new_state.is_some());
      if !state.config.test && !skip_store && write_back {
        match &result.new_state {
          Some(new_state) => state.store.put(esm_tag.clone(), new_state.clone()),
          None => {
            state.store.remove(&esm_tag);
          }
        }
      }
      result.force_save = false;
      if resource_gone && state.store.clear_resource_id(&esm_tag) {
        info!(%tag, "managed resource is gone, cleared its resource_id");
        result.add_comment(format!("Resource for {tag} no longer exists and will be recreated."));
      }
    }

    debug!(%tag, result = result.result, executed, "chunk completed");
    outcome.running.insert(tag.clone(), result);
    outcome.completed.insert(tag);
  }
}

/// Calls the handler with the chunk's own context, then checks for a
/// vanished resource when the chunk asks to be recreated.
async fn execute(
  handler: Arc<dyn OperationHandler>,
  mut ctx: OperationContext,
  chunk: &Chunk,
  kwargs: Kwargs,
) -> (ChunkResult, bool) {
  let started_at = Utc::now();
  let timer = Instant::now();
  let mut result = match handler.call(&mut ctx, kwargs).await {
    Ok(r) => r,
    Err(e) => {
      warn!(tag = ?ctx.tag, error = %e, "operation failed");
      ChunkResult::failure(e.to_string())
    }
  };
  result.started_at = Some(started_at);
  result.total_seconds = timer.elapsed().as_secs_f64();

  let mut resource_gone = false;
  if chunk.recreate_if_deleted
    && !result.result
    && !result.has_rerun_data()
    && !result.force_save
  {
    let resource_id = ctx
      .enforced_state
      .as_ref()
      .and_then(|s| s.get("resource_id"))
      .and_then(|v| v.as_str())
      .filter(|s| !s.is_empty())
      .map(str::to_string);
    if let Some(resource_id) = resource_id {
      resource_gone = matches!(handler.exists(&ctx, &resource_id).await, Some(Ok(false)));
    }
  }
  (result, resource_gone)
}
