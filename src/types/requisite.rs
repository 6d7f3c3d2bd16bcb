//! Requisite declarations carried by chunks.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of requisite kinds understood by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequisiteKind {
  Require,
  Watch,
  Onchanges,
  Onfail,
  Listen,
  ArgBind,
  Prereq,
  Sensitive,
  RecreateOnUpdate,
}

impl RequisiteKind {
  pub const ALL: [RequisiteKind; 9] = [
    RequisiteKind::Require,
    RequisiteKind::Watch,
    RequisiteKind::Onchanges,
    RequisiteKind::Onfail,
    RequisiteKind::Listen,
    RequisiteKind::ArgBind,
    RequisiteKind::Prereq,
    RequisiteKind::Sensitive,
    RequisiteKind::RecreateOnUpdate,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      RequisiteKind::Require => "require",
      RequisiteKind::Watch => "watch",
      RequisiteKind::Onchanges => "onchanges",
      RequisiteKind::Onfail => "onfail",
      RequisiteKind::Listen => "listen",
      RequisiteKind::ArgBind => "arg_bind",
      RequisiteKind::Prereq => "prereq",
      RequisiteKind::Sensitive => "sensitive",
      RequisiteKind::RecreateOnUpdate => "recreate_on_update",
    }
  }
}

impl fmt::Display for RequisiteKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One argument binding: copy `source` (a path into the referenced chunk's
/// `new_state`) into `target` (a path into this chunk's keyword arguments).
///
/// Paths are colon-separated keys with optional `[i]` indexes, e.g.
/// `subnets[0]:id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgBinding {
  pub source: String,
  pub target: String,
}

impl ArgBinding {
  pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
    Self {
      source: source.into(),
      target: target.into(),
    }
  }
}

/// A referenced name within a requisite entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequisiteTarget {
  /// Declared name or `__id__` of the referenced chunk (glob allowed).
  pub name: String,
  /// Argument bindings; only meaningful for `arg_bind`.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub args: Vec<ArgBinding>,
}

/// One `{referenced_state: referenced_name_or_list}` entry of a requisite list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequisiteRef {
  pub state: String,
  pub targets: Vec<RequisiteTarget>,
}

impl RequisiteRef {
  /// Reference to a single name.
  pub fn new(state: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      state: state.into(),
      targets: vec![RequisiteTarget {
        name: name.into(),
        args: vec![],
      }],
    }
  }

  /// Reference to several names of the same state.
  pub fn names<S: AsRef<str>>(state: impl Into<String>, names: &[S]) -> Self {
    Self {
      state: state.into(),
      targets: names
        .iter()
        .map(|n| RequisiteTarget {
          name: n.as_ref().to_string(),
          args: vec![],
        })
        .collect(),
    }
  }

  /// Argument-binding reference to a single name.
  pub fn bind(state: impl Into<String>, name: impl Into<String>, args: Vec<ArgBinding>) -> Self {
    Self {
      state: state.into(),
      targets: vec![RequisiteTarget {
        name: name.into(),
        args,
      }],
    }
  }
}
