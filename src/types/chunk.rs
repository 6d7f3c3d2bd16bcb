//! An atomic declared operation ("chunk") and lookup over chunk lists.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use super::{Kwargs, RequisiteKind, RequisiteRef, Tag, esm_tag, tag};
use crate::glob::glob_match;

/// `(state, fun)` pair naming an operation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FunctionRef {
  pub state: String,
  pub fun: String,
}

impl FunctionRef {
  pub fn new(state: impl Into<String>, fun: impl Into<String>) -> Self {
    Self {
      state: state.into(),
      fun: fun.into(),
    }
  }
}

impl fmt::Display for FunctionRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}", self.state, self.fun)
  }
}

/// One atomic declared operation, as produced by the compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
  /// Provider/kind identifier, e.g. `aws.ec2.vpc`.
  pub state: String,
  /// Operation name, e.g. `present`.
  pub fun: String,
  /// Declaration identifier within its source.
  #[serde(rename = "__id__")]
  pub id: String,
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name_prefix: Option<String>,
  /// Source document the declaration came from.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sls: Option<String>,
  #[serde(default)]
  pub order: u64,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub requisites: BTreeMap<RequisiteKind, Vec<RequisiteRef>>,
  /// Declares the operation unsafe to run concurrently with the same `(state, fun)`.
  #[serde(default)]
  pub unique: bool,
  #[serde(default)]
  pub recreate_if_deleted: bool,
  /// Retry metadata carried forward by reconciliation.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub rerun_data: Option<Value>,
  #[serde(default)]
  pub kwargs: Kwargs,
}

impl Chunk {
  pub fn new(
    state: impl Into<String>,
    id: impl Into<String>,
    name: impl Into<String>,
    fun: impl Into<String>,
  ) -> Self {
    Self {
      state: state.into(),
      fun: fun.into(),
      id: id.into(),
      name: name.into(),
      name_prefix: None,
      sls: None,
      order: 0,
      requisites: BTreeMap::new(),
      unique: false,
      recreate_if_deleted: false,
      rerun_data: None,
      kwargs: Kwargs::new(),
    }
  }

  pub fn with_requisite(mut self, kind: RequisiteKind, reference: RequisiteRef) -> Self {
    self.requisites.entry(kind).or_default().push(reference);
    self
  }

  pub fn with_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
    self.kwargs.insert(key.into(), value);
    self
  }

  pub fn with_order(mut self, order: u64) -> Self {
    self.order = order;
    self
  }

  pub fn with_sls(mut self, sls: impl Into<String>) -> Self {
    self.sls = Some(sls.into());
    self
  }

  pub fn unique(mut self) -> Self {
    self.unique = true;
    self
  }

  pub fn tag(&self) -> Tag {
    tag(self)
  }

  pub fn esm_tag(&self) -> Tag {
    esm_tag(self)
  }

  pub fn function_ref(&self) -> FunctionRef {
    FunctionRef::new(&self.state, &self.fun)
  }

  /// Requisite references declared under `kind` (empty if none).
  pub fn requisites_of(&self, kind: RequisiteKind) -> &[RequisiteRef] {
    self
      .requisites
      .get(&kind)
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }
}

/// Returns every chunk whose state and declared name (or `__id__`) match.
///
/// The `sls` pseudo-state matches chunks by their source document instead.
#[instrument(level = "trace", skip(chunks))]
pub fn find<'a>(chunks: &'a [Chunk], state: &str, name: &str) -> Vec<&'a Chunk> {
  chunks
    .iter()
    .filter(|c| {
      if state == "sls" && c.sls.as_deref().is_some_and(|s| glob_match(name, s)) {
        return true;
      }
      c.state == state && (glob_match(name, &c.name) || glob_match(name, &c.id))
    })
    .collect()
}
