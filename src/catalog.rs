//! Requisite Catalog: static table of requisite kinds and their scheduling flags.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{Chunk, FunctionRef, RequisiteKind};

/// Behavior flags for one requisite kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequisiteDefinition {
  pub kind: RequisiteKind,
  pub is_prereq: bool,
  pub is_sensitive: bool,
  pub forces_recreate: bool,
  /// Falls back to the External State Store when the target is not in the run.
  pub consults_store: bool,
}

impl RequisiteDefinition {
  pub const fn plain(kind: RequisiteKind) -> Self {
    Self {
      kind,
      is_prereq: false,
      is_sensitive: false,
      forces_recreate: false,
      consults_store: false,
    }
  }

  /// Resolved by the straight-requisite stage.
  pub fn is_straight(&self) -> bool {
    !self.is_prereq && !self.is_sensitive && !self.forces_recreate
  }
}

/// Requisite kinds plus the `(state, fun)` pairs flagged `unique`.
#[derive(Debug, Clone)]
pub struct RequisiteCatalog {
  definitions: BTreeMap<RequisiteKind, RequisiteDefinition>,
  unique: BTreeSet<FunctionRef>,
}

impl RequisiteCatalog {
  /// Catalog with no kinds; build up with [`RequisiteCatalog::insert`].
  pub fn empty() -> Self {
    Self {
      definitions: BTreeMap::new(),
      unique: BTreeSet::new(),
    }
  }

  /// The built-in requisite kinds.
  pub fn standard() -> Self {
    let mut catalog = Self::empty();
    for kind in [
      RequisiteKind::Watch,
      RequisiteKind::Onchanges,
      RequisiteKind::Onfail,
      RequisiteKind::Listen,
    ] {
      catalog.insert(RequisiteDefinition::plain(kind));
    }
    for kind in [RequisiteKind::Require, RequisiteKind::ArgBind] {
      catalog.insert(RequisiteDefinition {
        consults_store: true,
        ..RequisiteDefinition::plain(kind)
      });
    }
    catalog.insert(RequisiteDefinition {
      is_prereq: true,
      ..RequisiteDefinition::plain(RequisiteKind::Prereq)
    });
    catalog.insert(RequisiteDefinition {
      is_sensitive: true,
      ..RequisiteDefinition::plain(RequisiteKind::Sensitive)
    });
    catalog.insert(RequisiteDefinition {
      forces_recreate: true,
      ..RequisiteDefinition::plain(RequisiteKind::RecreateOnUpdate)
    });
    catalog
  }

  pub fn insert(&mut self, definition: RequisiteDefinition) {
    self.definitions.insert(definition.kind, definition);
  }

  pub fn get(&self, kind: RequisiteKind) -> Option<&RequisiteDefinition> {
    self.definitions.get(&kind)
  }

  /// All definitions in kind order.
  pub fn definitions(&self) -> impl Iterator<Item = &RequisiteDefinition> {
    self.definitions.values()
  }

  pub fn mark_unique(&mut self, function: FunctionRef) {
    self.unique.insert(function);
  }

  /// True if the chunk's `(state, fun)` must not run concurrently with its peers.
  pub fn is_unique(&self, chunk: &Chunk) -> bool {
    chunk.unique || self.unique.contains(&chunk.function_ref())
  }
}

impl Default for RequisiteCatalog {
  fn default() -> Self {
    Self::standard()
  }
}
