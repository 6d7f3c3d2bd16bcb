//! Tests for `StateStore` default methods over `MemoryStore`.

use serde_json::json;

use super::{MemoryStore, StateStore};
use crate::types::Tag;

fn store() -> MemoryStore {
  MemoryStore::new()
    .with_entry("net_|-vpc_|-vpc-main_|-", json!({"resource_id": "vpc-1", "cidr": "10.0.0.0/16"}))
    .with_entry("net_|-subnet_|-subnet-a_|-", json!({"resource_id": "subnet-1"}))
}

#[test]
fn get_matches_state_and_name_or_id() {
  let s = store();
  assert_eq!(s.get("net", "vpc-main").unwrap().id, "vpc");
  assert_eq!(s.get("net", "subnet").unwrap().name, "subnet-a");
  assert!(s.get("svc", "vpc-main").is_none());
  assert!(s.get("net", "missing").is_none());
}

#[test]
fn as_chunk_is_present_with_state_as_kwargs() {
  let s = store();
  let e = s.get("net", "vpc-main").unwrap();
  let c = s.as_chunk(&e);
  assert_eq!(c.fun, "present");
  assert_eq!(c.esm_tag(), e.tag);
  assert_eq!(c.kwargs["cidr"], json!("10.0.0.0/16"));
}

#[test]
fn clear_resource_id_only_touches_the_handle() {
  let mut s = store();
  let t = Tag::from("net_|-vpc_|-vpc-main_|-");
  assert!(s.clear_resource_id(&t));
  assert!(!s.clear_resource_id(&t));
  let e = s.get_by_tag(&t).unwrap();
  assert_eq!(e.resource_id(), None);
  assert_eq!(e.new_state["cidr"], json!("10.0.0.0/16"));
  assert!(!s.clear_resource_id(&Tag::from("x_|-y_|-z_|-")));
}

#[test]
fn put_remove_and_flush() {
  let mut s = MemoryStore::new();
  let t = Tag::from("a_|-b_|-c_|-");
  s.put(t.clone(), json!({"k": 1}));
  assert_eq!(s.snapshot().len(), 1);
  assert_eq!(s.remove(&t), Some(json!({"k": 1})));
  assert!(s.snapshot().is_empty());
  s.flush().unwrap();
  assert_eq!(s.flushes(), 1);
}
