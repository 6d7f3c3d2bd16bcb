//! Tests for prerequisite propagation.

use std::collections::BTreeSet;

use crate::catalog::RequisiteCatalog;
use crate::sequencer::{PrereqStage, SeqInput, Sequencer, StraightStage};
use crate::store::MemoryStore;
use crate::types::{
  Chunk, ChunkResult, RequisiteKind, RequisiteRef, Running, SeqEntry, SeqMap,
};

fn sequence(chunks: &[Chunk], running: &Running) -> SeqMap {
  let catalog = RequisiteCatalog::standard();
  let store = MemoryStore::new();
  let skip_store = BTreeSet::new();
  let input = SeqInput {
    chunks,
    running,
    store: &store,
    catalog: &catalog,
    skip_store: &skip_store,
  };
  Sequencer::new(vec![Box::new(StraightStage), Box::new(PrereqStage)]).run(&input)
}

fn svc(id: &str) -> Chunk {
  Chunk::new("svc", id, id, "present")
}

fn prereq(chunk: Chunk, target: &str) -> Chunk {
  chunk.with_requisite(RequisiteKind::Prereq, RequisiteRef::new("svc", target))
}

fn require(chunk: Chunk, target: &str) -> Chunk {
  chunk.with_requisite(RequisiteKind::Require, RequisiteRef::new("svc", target))
}

fn entry<'a>(seq: &'a SeqMap, id: &str) -> &'a SeqEntry {
  seq.values().find(|e| e.chunk.id == id).unwrap()
}

#[test]
fn dependents_of_target_wait_on_declarer() {
  let t = svc("t");
  let x = prereq(svc("x"), "t");
  let y = require(svc("y"), "t");
  let seq = sequence(&[t.clone(), x.clone(), y], &Running::new());
  assert_eq!(entry(&seq, "x").unmet, BTreeSet::from([t.tag()]));
  assert_eq!(entry(&seq, "y").unmet, BTreeSet::from([t.tag(), x.tag()]));
  assert!(entry(&seq, "t").is_ready());
}

#[test]
fn completed_target_still_orders_dependents_after_declarer() {
  let t = svc("t");
  let x = prereq(svc("x"), "t");
  let y = require(svc("y"), "t");
  let mut running = Running::new();
  running.insert(t.tag(), ChunkResult::success("ok"));
  let seq = sequence(&[t.clone(), x.clone(), y], &running);
  let xe = entry(&seq, "x");
  assert!(xe.is_ready());
  assert_eq!(xe.reqrets[0].kind, RequisiteKind::Prereq);
  assert_eq!(entry(&seq, "y").unmet, BTreeSet::from([x.tag()]));
}

#[test]
fn no_edge_back_to_a_chunk_the_declarer_waits_on() {
  let t = svc("t");
  let y = require(svc("y"), "t");
  let x = require(prereq(svc("x"), "t"), "y");
  let seq = sequence(&[t.clone(), y, x], &Running::new());
  assert_eq!(entry(&seq, "y").unmet, BTreeSet::from([t.tag()]));
}

#[test]
fn unknown_prereq_target_is_an_error() {
  let x = prereq(svc("x"), "gone");
  let seq = sequence(&[x], &Running::new());
  assert_eq!(
    entry(&seq, "x").errors,
    vec!["Requisite prereq svc:gone not found in current run.".to_string()]
  );
}

#[test]
fn declarers_of_a_completed_target_do_not_wait_on_each_other() {
  let t = svc("t");
  let x1 = prereq(svc("x1"), "t");
  let x2 = prereq(svc("x2"), "t");
  let mut running = Running::new();
  running.insert(t.tag(), ChunkResult::success("ok"));
  let seq = sequence(&[t, x1, x2], &running);
  assert!(entry(&seq, "x1").is_ready());
  assert!(entry(&seq, "x2").is_ready());
}

#[test]
fn declarers_sharing_a_target_wait_only_on_the_target() {
  let t = svc("t");
  let x1 = prereq(svc("x1"), "t");
  let x2 = prereq(svc("x2"), "t");
  let y = require(svc("y"), "t");
  let seq = sequence(&[t.clone(), x1.clone(), x2.clone(), y], &Running::new());
  assert!(entry(&seq, "t").is_ready());
  assert_eq!(entry(&seq, "x1").unmet, BTreeSet::from([t.tag()]));
  assert_eq!(entry(&seq, "x2").unmet, BTreeSet::from([t.tag()]));
  assert_eq!(
    entry(&seq, "y").unmet,
    BTreeSet::from([t.tag(), x1.tag(), x2.tag()])
  );
}

#[test]
fn prereq_chain_runs_back_to_front() {
  let a = prereq(svc("a"), "b");
  let b = prereq(svc("b"), "c");
  let c = svc("c");
  let y = require(svc("y"), "c");
  let seq = sequence(&[a, b.clone(), c.clone(), y], &Running::new());
  assert!(entry(&seq, "c").is_ready());
  assert_eq!(entry(&seq, "b").unmet, BTreeSet::from([c.tag()]));
  assert_eq!(entry(&seq, "a").unmet, BTreeSet::from([b.tag()]));
  assert_eq!(entry(&seq, "y").unmet, BTreeSet::from([c.tag(), b.tag()]));
}

#[test]
fn propagation_never_closes_a_cycle() {
  // y requires t, x requires y and declares prereq on t: y must not wait on x.
  let t = svc("t");
  let y = require(svc("y"), "t");
  let x = require(prereq(svc("x"), "t"), "y");
  let mut running = Running::new();
  running.insert(t.tag(), ChunkResult::success("ok"));
  let seq = sequence(&[t, y.clone(), x], &running);
  assert!(entry(&seq, "y").is_ready());
  assert_eq!(entry(&seq, "x").unmet, BTreeSet::from([y.tag()]));
}
