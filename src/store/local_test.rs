//! Tests for the file-backed store.

use serde_json::json;

use super::{ESM_SUBDIR, LocalStore, StateStore};
use crate::error::StoreError;
use crate::types::Tag;

#[test]
fn flush_then_reopen_keeps_entries() {
  let dir = tempfile::tempdir().unwrap();
  {
    let mut store = LocalStore::open(dir.path(), "run1").unwrap();
    store.put(Tag::from("net_|-vpc_|-vpc-main_|-"), json!({"resource_id": "vpc-1"}));
    store.flush().unwrap();
    assert!(store.path().ends_with("esm/local/run1.json"));
  }
  let store = LocalStore::open(dir.path(), "run1").unwrap();
  let e = store.get("net", "vpc-main").unwrap();
  assert_eq!(e.resource_id(), Some("vpc-1"));
}

#[test]
fn second_writer_is_locked_out_until_drop() {
  let dir = tempfile::tempdir().unwrap();
  let first = LocalStore::open(dir.path(), "run1").unwrap();
  match LocalStore::open(dir.path(), "run1") {
    Err(StoreError::Locked { path }) => assert!(path.ends_with("run1.lock")),
    other => panic!("expected lock error, got {other:?}"),
  }
  // other run names are independent
  assert!(LocalStore::open(dir.path(), "run2").is_ok());
  drop(first);
  assert!(LocalStore::open(dir.path(), "run1").is_ok());
}

#[test]
fn unflushed_changes_are_not_persisted() {
  let dir = tempfile::tempdir().unwrap();
  {
    let mut store = LocalStore::open(dir.path(), "r").unwrap();
    store.put(Tag::from("a_|-b_|-c_|-"), json!({}));
  }
  let store = LocalStore::open(dir.path(), "r").unwrap();
  assert!(store.snapshot().is_empty());
}

#[test]
fn corrupt_file_is_an_error_and_releases_lock() {
  let dir = tempfile::tempdir().unwrap();
  let esm = dir.path().join(ESM_SUBDIR);
  std::fs::create_dir_all(&esm).unwrap();
  std::fs::write(esm.join("r.json"), "not json").unwrap();
  assert!(matches!(LocalStore::open(dir.path(), "r"), Err(StoreError::Json(_))));
  assert!(!esm.join("r.lock").exists());
}
