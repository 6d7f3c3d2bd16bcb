//! Deterministic chunk identity.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Chunk;

/// Separator between the components of a tag.
pub const TAG_SEPARATOR: &str = "_|-";

/// Identity of a chunk: `{state}_|-{__id__}_|-{name}_|-{fun}`.
///
/// The ESM variant of a tag omits `fun` so that it stays stable across
/// `present`/`absent` flips of the same resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
  pub fn new(raw: impl Into<String>) -> Self {
    Self(raw.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// State component of the tag.
  pub fn state(&self) -> &str {
    tag_to_state(&self.0)
  }

  /// Splits the tag into `(state, __id__, name)`; `None` if it is malformed.
  pub fn components(&self) -> Option<(&str, &str, &str)> {
    let mut parts = self.0.splitn(4, TAG_SEPARATOR);
    let state = parts.next()?;
    let id = parts.next()?;
    let name = parts.next()?;
    Some((state, id, name))
  }
}

impl fmt::Display for Tag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for Tag {
  fn from(s: &str) -> Self {
    Self(s.to_string())
  }
}

/// Name used in tags: `name_prefix` wins when `name` was built from it.
fn tag_name(chunk: &Chunk) -> &str {
  match chunk.name_prefix.as_deref() {
    Some(prefix) if !prefix.is_empty() && chunk.name.contains(prefix) => prefix,
    _ => &chunk.name,
  }
}

/// Tag used to key the External State Store (no `fun` component).
pub fn esm_tag(chunk: &Chunk) -> Tag {
  Tag(format!(
    "{}{sep}{}{sep}{}{sep}",
    chunk.state,
    chunk.id,
    tag_name(chunk),
    sep = TAG_SEPARATOR
  ))
}

/// Tag used to key the running-result set.
pub fn tag(chunk: &Chunk) -> Tag {
  let mut raw = esm_tag(chunk).0;
  raw.push_str(&chunk.fun);
  Tag(raw)
}

/// Returns the state portion of a raw tag string.
pub fn tag_to_state(tag: &str) -> &str {
  tag.find("_|").map(|i| &tag[..i]).unwrap_or(tag)
}
