//! Run configuration: JSON file plus `CONVERGE_*` environment overrides.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::error::ConfigError;
use crate::reconcile::{DEFAULT_MAX_PENDING_RERUNS, WaitPolicy};

/// Default concurrency limit per batch.
pub const DEFAULT_BATCH_SIZE: i64 = 50;

/// Environment variables read by [`RunConfig::from_env`].
pub const ENV_KEYS: [&str; 7] = [
  "CONVERGE_RUN_NAME",
  "CONVERGE_TEST",
  "CONVERGE_BATCH_SIZE",
  "CONVERGE_MAX_PENDING_RERUNS",
  "CONVERGE_RECONCILE",
  "CONVERGE_TARGET",
  "CONVERGE_CACHE_DIR",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
  pub run_name: String,
  /// Dry run: operations see `test = true`, nothing is written to the store,
  /// no reconciliation.
  pub test: bool,
  /// Concurrency limit; `<= 0` means unbounded.
  pub batch_size: i64,
  pub max_pending_reruns: u32,
  pub reconcile: bool,
  pub default_wait: WaitPolicy,
  /// Restrict the run to one declaration id and its dependencies.
  pub target: Option<String>,
  /// Root for the local state store; in-memory store when unset.
  pub cache_dir: Option<PathBuf>,
}

impl Default for RunConfig {
  fn default() -> Self {
    Self {
      run_name: format!("run_{}", Uuid::new_v4()),
      test: false,
      batch_size: DEFAULT_BATCH_SIZE,
      max_pending_reruns: DEFAULT_MAX_PENDING_RERUNS,
      reconcile: true,
      default_wait: WaitPolicy::default(),
      target: None,
      cache_dir: None,
    }
  }
}

impl RunConfig {
  /// Loads a JSON config; missing fields take their defaults.
  #[instrument(level = "trace")]
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Ok(serde_json::from_slice(&bytes)?)
  }

  /// Applies overrides from the process environment.
  pub fn from_env(self) -> Result<Self, ConfigError> {
    let envs: HashMap<String, String> = ENV_KEYS
      .iter()
      .filter_map(|k| std::env::var(k).ok().map(|v| (k.to_string(), v)))
      .collect();
    self.apply_env(&envs)
  }

  /// Applies overrides from an environment map. Empty values are ignored.
  pub fn apply_env(mut self, envs: &HashMap<String, String>) -> Result<Self, ConfigError> {
    let get = |key: &str| {
      envs
        .get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
    };
    if let Some(v) = get("CONVERGE_RUN_NAME") {
      self.run_name = v;
    }
    if let Some(v) = get("CONVERGE_TEST") {
      self.test = parse_bool("CONVERGE_TEST", &v)?;
    }
    if let Some(v) = get("CONVERGE_BATCH_SIZE") {
      self.batch_size = parse_num("CONVERGE_BATCH_SIZE", &v)?;
    }
    if let Some(v) = get("CONVERGE_MAX_PENDING_RERUNS") {
      self.max_pending_reruns = parse_num("CONVERGE_MAX_PENDING_RERUNS", &v)?;
    }
    if let Some(v) = get("CONVERGE_RECONCILE") {
      self.reconcile = parse_bool("CONVERGE_RECONCILE", &v)?;
    }
    if let Some(v) = get("CONVERGE_TARGET") {
      self.target = Some(v);
    }
    if let Some(v) = get("CONVERGE_CACHE_DIR") {
      self.cache_dir = Some(PathBuf::from(v));
    }
    Ok(self)
  }
}

fn invalid(key: &str, value: &str) -> ConfigError {
  ConfigError::InvalidEnv {
    key: key.to_string(),
    value: value.to_string(),
  }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
  match value.to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Ok(true),
    "0" | "false" | "no" | "off" => Ok(false),
    _ => Err(invalid(key, value)),
  }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
  value.parse().map_err(|_| invalid(key, value))
}
