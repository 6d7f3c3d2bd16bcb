//! Final per-run report.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ChunkResult, Tag};

/// Terminal state of a chunk at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
  Converged,
  Failed,
  Stalled,
}

impl fmt::Display for TerminalState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TerminalState::Converged => write!(f, "converged"),
      TerminalState::Failed => write!(f, "failed"),
      TerminalState::Stalled => write!(f, "stalled"),
    }
  }
}

/// Remaining dependency graph when a pass could not make progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StallDiagnostic {
  /// Pass (0 = initial run) in which the stall occurred.
  pub pass: u32,
  pub unmet: BTreeMap<Tag, Vec<Tag>>,
  pub errors: BTreeMap<Tag, Vec<String>>,
}

impl StallDiagnostic {
  pub fn message(&self) -> String {
    let unmet: Vec<String> = self
      .unmet
      .iter()
      .map(|(tag, deps)| {
        let deps: Vec<&str> = deps.iter().map(Tag::as_str).collect();
        format!("{tag} -> [{}]", deps.join(", "))
      })
      .collect();
    format!(
      "No sequence changed. Check for possible circular dependencies: {}",
      unmet.join("; ")
    )
  }
}

/// Terminal state and accumulated output for one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkReport {
  pub tag: Tag,
  pub terminal: TerminalState,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub result: Option<ChunkResult>,
  #[serde(default)]
  pub errors: Vec<String>,
  #[serde(default)]
  pub comments: Vec<String>,
  /// Number of times the chunk's operation was called.
  #[serde(default)]
  pub executions: u32,
}

/// Serializable summary of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
  pub run_name: String,
  pub started_at: DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  /// Reconciliation passes after the initial one.
  pub reruns: u32,
  pub chunks: BTreeMap<Tag, ChunkReport>,
  #[serde(default)]
  pub stalls: Vec<StallDiagnostic>,
}

impl RunReport {
  pub fn terminal(&self, tag: &Tag) -> Option<TerminalState> {
    self.chunks.get(tag).map(|c| c.terminal)
  }

  pub fn count(&self, state: TerminalState) -> usize {
    self.chunks.values().filter(|c| c.terminal == state).count()
  }

  pub fn is_converged(&self) -> bool {
    self
      .chunks
      .values()
      .all(|c| c.terminal == TerminalState::Converged)
  }
}
