//! Tests for `ChunkResult`.

use serde_json::json;

use super::{ChunkResult, is_truthy};

#[test]
fn success_creates_true_result() {
  let r = ChunkResult::success("done");
  assert!(r.result);
  assert_eq!(r.comment, vec!["done".to_string()]);
  assert!(!r.has_changes());
  assert!(!r.has_rerun_data());
}

#[test]
fn failure_has_no_rerun_data() {
  let r = ChunkResult::failure("boom");
  assert!(!r.result);
  assert!(!r.has_rerun_data());
}

#[test]
fn pending_is_false_with_rerun_data() {
  let r = ChunkResult::pending("waiting", json!({"attempt": 1}));
  assert!(!r.result);
  assert!(r.has_rerun_data());
}

#[test]
fn empty_rerun_data_is_not_pending() {
  let r = ChunkResult::pending("waiting", json!({}));
  assert!(!r.has_rerun_data());
}

#[test]
fn add_comment_skips_duplicates() {
  let mut r = ChunkResult::success("");
  assert!(r.comment.is_empty());
  r.add_comment("a");
  r.add_comment("a");
  r.add_comment("b");
  assert_eq!(r.comment, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn truthiness_follows_json_emptiness() {
  assert!(!is_truthy(&json!(null)));
  assert!(!is_truthy(&json!({})));
  assert!(!is_truthy(&json!([])));
  assert!(!is_truthy(&json!("")));
  assert!(!is_truthy(&json!(0)));
  assert!(is_truthy(&json!({"k": 1})));
  assert!(is_truthy(&json!(true)));
}

#[test]
fn deserializes_with_defaults() {
  let r: ChunkResult = serde_json::from_value(json!({"name": "x", "result": true})).unwrap();
  assert!(r.result);
  assert_eq!(r.changes, json!({}));
  assert!(r.new_state.is_none());
}
