//! Error types.

use std::path::PathBuf;

/// An operation handler failed instead of returning a well-formed result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OperationError {
  #[error("{0}")]
  Failed(String),
  #[error("operation task aborted: {0}")]
  Aborted(String),
}

impl OperationError {
  pub fn failed(msg: impl Into<String>) -> Self {
    Self::Failed(msg.into())
  }
}

/// External State Store persistence failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("state store I/O error: {0}")]
  Io(#[from] std::io::Error),
  #[error("state store is not valid JSON: {0}")]
  Json(#[from] serde_json::Error),
  #[error("state store is locked by another writer: {}", path.display())]
  Locked { path: PathBuf },
}

/// Run report could not be written or read back.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
  #[error("run report I/O error at {}: {source}", path.display())]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("cannot encode run report for {}: {source}", path.display())]
  Encode {
    path: PathBuf,
    source: serde_json::Error,
  },
  #[error("run report {} is not valid JSON: {source}", path.display())]
  Decode {
    path: PathBuf,
    source: serde_json::Error,
  },
}

/// Invalid or unreadable run configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("cannot read config {}: {source}", path.display())]
  Read {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("invalid config JSON: {0}")]
  Parse(#[from] serde_json::Error),
  #[error("invalid value for {key}: {value:?}")]
  InvalidEnv { key: String, value: String },
}

/// Fatal run-level failure. Per-chunk failures are reported, not raised.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  #[error("no chunks to run")]
  NoChunks,
  #[error("target {0:?} matches no chunk")]
  UnknownTarget(String),
  #[error("two chunks share the tag {0}")]
  DuplicateTag(crate::types::Tag),
  #[error(transparent)]
  Store(#[from] StoreError),
  #[error(transparent)]
  Report(#[from] ReportError),
}
