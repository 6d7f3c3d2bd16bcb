//! Data model shared by the sequencer, runtime and reconciliation controller.

use std::collections::BTreeMap;

mod chunk;
mod chunk_result;
#[cfg(test)]
mod chunk_result_test;
mod esm_entry;
mod requisite;
mod run_report;
#[cfg(test)]
mod run_report_test;
mod seq_entry;
mod tag;

pub use chunk::{Chunk, FunctionRef, find};
pub use chunk_result::{ChunkResult, is_truthy};
pub use esm_entry::EsmEntry;
pub use requisite::{ArgBinding, RequisiteKind, RequisiteRef, RequisiteTarget};
pub use run_report::{ChunkReport, RunReport, StallDiagnostic, TerminalState};
pub use seq_entry::{ReqRet, SeqEntry, SeqMap};
pub use tag::{TAG_SEPARATOR, Tag, esm_tag, tag, tag_to_state};

/// Provider-specific keyword arguments of a chunk.
pub type Kwargs = serde_json::Map<String, serde_json::Value>;

/// Running-result set: tag of every completed chunk to its result.
pub type Running = BTreeMap<Tag, ChunkResult>;
