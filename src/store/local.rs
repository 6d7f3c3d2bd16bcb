//! File-backed store: `<cache_dir>/esm/local/<run_name>.json`, one writer per run name.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, instrument, warn};

use super::StateStore;
use crate::error::StoreError;
use crate::report_io::write_atomic;
use crate::types::Tag;

/// Directory under the cache dir holding local store files.
pub const ESM_SUBDIR: &str = "esm/local";

/// JSON-file External State Store guarded by a `.lock` file.
///
/// The lock is taken on [`LocalStore::open`] and released on drop.
#[derive(Debug)]
pub struct LocalStore {
  path: PathBuf,
  lock_path: PathBuf,
  entries: BTreeMap<Tag, Value>,
}

impl LocalStore {
  /// Opens (or creates) the store for `run_name`, failing if another writer holds the lock.
  #[instrument(level = "trace", skip(cache_dir))]
  pub fn open(cache_dir: &Path, run_name: &str) -> Result<Self, StoreError> {
    let dir = cache_dir.join(ESM_SUBDIR);
    fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{run_name}.json"));
    let lock_path = dir.join(format!("{run_name}.lock"));

    match OpenOptions::new()
      .write(true)
      .create_new(true)
      .open(&lock_path)
    {
      Ok(_) => {}
      Err(e) if e.kind() == ErrorKind::AlreadyExists => {
        return Err(StoreError::Locked { path: lock_path });
      }
      Err(e) => return Err(e.into()),
    }

    let entries = match load_entries(&path) {
      Ok(entries) => entries,
      Err(e) => {
        let _ = fs::remove_file(&lock_path);
        return Err(e);
      }
    };
    info!(path = %path.display(), entries = entries.len(), "opened local state store");
    Ok(Self {
      path,
      lock_path,
      entries,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

fn load_entries(path: &Path) -> Result<BTreeMap<Tag, Value>, StoreError> {
  match fs::read(path) {
    Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
    Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
    Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
    Err(e) => Err(e.into()),
  }
}

impl StateStore for LocalStore {
  fn entries(&self) -> &BTreeMap<Tag, Value> {
    &self.entries
  }

  fn entries_mut(&mut self) -> &mut BTreeMap<Tag, Value> {
    &mut self.entries
  }

  #[instrument(level = "trace", skip(self))]
  fn flush(&mut self) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(&self.entries)?;
    write_atomic(&self.path, &json)?;
    Ok(())
  }
}

impl Drop for LocalStore {
  fn drop(&mut self) {
    if let Err(e) = fs::remove_file(&self.lock_path) {
      warn!(path = %self.lock_path.display(), error = %e, "failed to release state store lock");
    }
  }
}
