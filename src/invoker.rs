//! Operation invoker: capability table from `(state, fun)` to handlers.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use dyn_clone::DynClone;
use serde_json::Value;

use crate::error::OperationError;
use crate::reconcile::WaitPolicy;
use crate::types::{ChunkResult, FunctionRef, Kwargs, Tag};

/// Data an operation may attach to its context. Cloned with the context.
pub trait ContextExtension: DynClone + Any + Send + Sync + fmt::Debug {
  fn as_any(&self) -> &dyn Any;
}

dyn_clone::clone_trait_object!(ContextExtension);

impl<T: Clone + Any + Send + Sync + fmt::Debug> ContextExtension for T {
  fn as_any(&self) -> &dyn Any {
    self
  }
}

/// Per-chunk execution context. Every executing chunk owns its own copy.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
  pub run_name: String,
  pub test: bool,
  pub tag: Option<Tag>,
  /// Retry metadata from the previous pass, if the chunk is being re-run.
  pub rerun_data: Option<Value>,
  /// Last stored state for the chunk's ESM tag.
  pub enforced_state: Option<Value>,
  /// Credentials/profile data, opaque to the scheduler.
  pub acct: Value,
  pub extensions: BTreeMap<String, Box<dyn ContextExtension>>,
}

impl OperationContext {
  pub fn insert_extension<T: ContextExtension>(&mut self, key: impl Into<String>, value: T) {
    self.extensions.insert(key.into(), Box::new(value));
  }

  pub fn extension<T: 'static>(&self, key: &str) -> Option<&T> {
    let ext: &dyn ContextExtension = &**self.extensions.get(key)?;
    ext.as_any().downcast_ref::<T>()
  }
}

/// A resource-provider operation.
#[async_trait]
pub trait OperationHandler: Send + Sync {
  async fn call(
    &self,
    ctx: &mut OperationContext,
    kwargs: Kwargs,
  ) -> Result<ChunkResult, OperationError>;

  /// Whether the resource behind `resource_id` still exists; `None` if the
  /// handler cannot tell.
  async fn exists(
    &self,
    _ctx: &OperationContext,
    _resource_id: &str,
  ) -> Option<Result<bool, OperationError>> {
    None
  }
}

/// Adapts an async closure into an [`OperationHandler`]. The closure receives
/// its own copy of the context.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> OperationHandler for FnHandler<F>
where
  F: Fn(OperationContext, Kwargs) -> Fut + Send + Sync,
  Fut: Future<Output = Result<ChunkResult, OperationError>> + Send,
{
  async fn call(
    &self,
    ctx: &mut OperationContext,
    kwargs: Kwargs,
  ) -> Result<ChunkResult, OperationError> {
    (self.0)(ctx.clone(), kwargs).await
  }
}

/// Counters handed to pending predicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingKwargs {
  pub reruns_wo_change_count: u32,
  pub reruns_count: u32,
  pub max_pending_reruns: u32,
}

/// Provider-specific "is this result still pending" check.
pub trait PendingPredicate: Send + Sync {
  fn is_pending(&self, result: &ChunkResult, kwargs: &PendingKwargs) -> bool;
}

impl<F> PendingPredicate for F
where
  F: Fn(&ChunkResult, &PendingKwargs) -> bool + Send + Sync,
{
  fn is_pending(&self, result: &ChunkResult, kwargs: &PendingKwargs) -> bool {
    self(result, kwargs)
  }
}

/// Handlers plus per-provider scheduling hints, populated at startup.
#[derive(Default)]
pub struct OperationRegistry {
  handlers: BTreeMap<FunctionRef, Arc<dyn OperationHandler>>,
  pending: BTreeMap<String, Arc<dyn PendingPredicate>>,
  waits: BTreeMap<String, WaitPolicy>,
  skip_store: BTreeSet<String>,
  unique: BTreeSet<FunctionRef>,
}

impl OperationRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, function: FunctionRef, handler: impl OperationHandler + 'static) {
    self.handlers.insert(function, Arc::new(handler));
  }

  /// Registers an async closure as the handler for `state.fun`.
  pub fn register_fn<F, Fut>(&mut self, state: &str, fun: &str, f: F)
  where
    F: Fn(OperationContext, Kwargs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ChunkResult, OperationError>> + Send + 'static,
  {
    self.register(FunctionRef::new(state, fun), FnHandler(f));
  }

  pub fn handler(&self, function: &FunctionRef) -> Option<Arc<dyn OperationHandler>> {
    self.handlers.get(function).cloned()
  }

  pub fn set_pending_predicate(&mut self, state: &str, predicate: impl PendingPredicate + 'static) {
    self.pending.insert(state.to_string(), Arc::new(predicate));
  }

  pub fn pending_predicate(&self, state: &str) -> Option<&dyn PendingPredicate> {
    self.pending.get(state).map(|p| p.as_ref())
  }

  pub fn set_wait_policy(&mut self, state: &str, policy: WaitPolicy) {
    self.waits.insert(state.to_string(), policy);
  }

  pub fn wait_policy(&self, state: &str) -> Option<&WaitPolicy> {
    self.waits.get(state)
  }

  /// Results of `state` are never written to, nor looked up in, the store.
  pub fn skip_store(&mut self, state: &str) {
    self.skip_store.insert(state.to_string());
  }

  pub fn skip_store_states(&self) -> &BTreeSet<String> {
    &self.skip_store
  }

  /// Marks `function` as unsafe to run concurrently with itself.
  pub fn mark_unique(&mut self, function: FunctionRef) {
    self.unique.insert(function);
  }

  pub fn unique_functions(&self) -> impl Iterator<Item = &FunctionRef> {
    self.unique.iter()
  }
}

impl fmt::Debug for OperationRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("OperationRegistry")
      .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
      .field("pending", &self.pending.keys().collect::<Vec<_>>())
      .field("waits", &self.waits)
      .field("skip_store", &self.skip_store)
      .field("unique", &self.unique)
      .finish()
  }
}
