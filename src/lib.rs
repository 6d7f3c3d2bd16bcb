//! # streamweave-converge
//!
//! Requisite-aware scheduler for declarative infrastructure runs.
//!
//! ## Architecture
//!
//! A run takes a flat list of [`Chunk`]s and drives it to a [`RunReport`]:
//!
//! - the [`Sequencer`] turns chunks plus completed results into a sequence
//!   map of resolved requisites and unmet dependencies, stage by stage
//!   (straight, cross-run store, prerequisite, unique);
//! - the [`Runtime`] executes ready chunks in bounded concurrent batches and
//!   merges results as they arrive;
//! - the [`Reconciler`] re-runs chunks that report they are still pending,
//!   until they settle or hit a retry ceiling.
//!
//! Operations are reached only through the [`OperationRegistry`]; previously
//! applied state lives behind the [`StateStore`] trait. With a cache dir
//! configured, each run's report is also kept on disk (see [`report_io`]).

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod gather;
pub(crate) mod glob;
pub mod invoker;
pub mod reconcile;
pub mod report_io;
pub mod rules;
pub mod run_state;
pub mod runtime;
pub mod sequencer;
pub mod store;
pub mod types;

pub use catalog::{RequisiteCatalog, RequisiteDefinition};
pub use config::RunConfig;
pub use engine::Engine;
pub use error::{ConfigError, EngineError, OperationError, ReportError, StoreError};
pub use invoker::{
  ContextExtension, FnHandler, OperationContext, OperationHandler, OperationRegistry,
  PendingKwargs, PendingPredicate,
};
pub use reconcile::{Reconciler, WaitPolicy};
pub use run_state::RunState;
pub use runtime::{PassOutcome, Runtime};
pub use sequencer::{SeqInput, SeqStage, Sequencer};
pub use store::{LocalStore, MemoryStore, StateStore};
pub use types::{Chunk, ChunkResult, RequisiteKind, RequisiteRef, RunReport, Tag, TerminalState};
