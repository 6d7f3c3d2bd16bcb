//! Requisite rules checked just before a ready chunk is executed.
//!
//! `require`/`watch` need successful targets, `onchanges`/`onfail` may skip
//! the chunk, `arg_bind` copies values out of the targets' `new_state`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::types::{Kwargs, ReqRet, RequisiteKind, SeqEntry};

/// `${state:name:path}` reference inside a string argument.
static ARG_REF: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"\$\{([^:}]+):([^:}]+):([^}]+)\}").expect("arg reference regex is valid")
});

/// Outcome of checking a chunk's resolved requisites.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleCheck {
  /// The chunk must fail without running.
  pub errors: Vec<String>,
  /// The chunk must be reported successful without running.
  pub skip: Option<String>,
}

/// Applies every requisite rule to `entry`, rewriting `kwargs` for `arg_bind`.
#[instrument(level = "trace", skip(entry, kwargs), fields(tag = %entry.tag))]
pub fn check_requisites(entry: &SeqEntry, kwargs: &mut Kwargs) -> RuleCheck {
  let mut check = RuleCheck::default();
  let of = |kind: RequisiteKind| entry.reqrets.iter().filter(move |r| r.kind == kind);

  for r in of(RequisiteKind::Require).chain(of(RequisiteKind::Watch)) {
    if !r.ret.result {
      check.errors.push(format!("One or more requisite failed: {}", r.tag));
    }
  }

  let onchanges: Vec<&ReqRet> = of(RequisiteKind::Onchanges).collect();
  if !onchanges.is_empty() && !onchanges.iter().any(|r| r.ret.has_changes()) {
    check.skip = Some("State was not run because none of the onchanges reqs changed".to_string());
  }

  let onfail: Vec<&ReqRet> = of(RequisiteKind::Onfail).collect();
  if !onfail.is_empty() && onfail.iter().all(|r| r.ret.result) {
    check.skip = Some("State was not run because onfail req did not change".to_string());
  }

  let binds: Vec<&ReqRet> = of(RequisiteKind::ArgBind).collect();
  for r in &binds {
    for binding in &r.args {
      match bound_value(r, &binding.source).and_then(|v| set_path(kwargs, &binding.target, v)) {
        Ok(()) => debug!(from = %r.tag, target = %binding.target, "argument bound"),
        Err(e) => check.errors.push(e),
      }
    }
  }
  if let Err(mut errors) = substitute_refs(kwargs, &binds) {
    check.errors.append(&mut errors);
  }
  check
}

fn bound_value(r: &ReqRet, source: &str) -> Result<Value, String> {
  let state = r
    .ret
    .new_state
    .as_ref()
    .ok_or_else(|| format!("Cannot bind '{source}': {} has no new_state", r.tag))?;
  let path = parse_path(source)?;
  get_path(state, &path)
    .cloned()
    .ok_or_else(|| format!("Could not resolve argument '{source}' from {}", r.tag))
}

/// Replaces `${state:name:path}` references in string arguments.
fn substitute_refs(kwargs: &mut Kwargs, binds: &[&ReqRet]) -> Result<(), Vec<String>> {
  let mut errors = vec![];
  for value in kwargs.values_mut() {
    substitute_value(value, binds, &mut errors);
  }
  if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn substitute_value(value: &mut Value, binds: &[&ReqRet], errors: &mut Vec<String>) {
  match value {
    Value::String(s) => {
      if !ARG_REF.is_match(s) {
        return;
      }
      let resolve = |caps: &regex::Captures<'_>| -> Result<Value, String> {
        let (state, name, path) = (&caps[1], &caps[2], &caps[3]);
        let r = binds
          .iter()
          .find(|r| r.state == state && r.name == name)
          .ok_or_else(|| format!("No arg_bind requisite for '{state}:{name}'"))?;
        bound_value(r, path)
      };
      // A string that is exactly one reference takes the referenced value as is.
      if let Some(caps) = ARG_REF.captures(s) {
        if caps.get(0).is_some_and(|m| m.start() == 0 && m.end() == s.len()) {
          match resolve(&caps) {
            Ok(v) => *value = v,
            Err(e) => errors.push(e),
          }
          return;
        }
      }
      let mut out = String::new();
      let mut last = 0;
      for caps in ARG_REF.captures_iter(s) {
        let Some(m) = caps.get(0) else { continue };
        out.push_str(&s[last..m.start()]);
        match resolve(&caps) {
          Ok(Value::String(v)) => out.push_str(&v),
          Ok(v) => out.push_str(&v.to_string()),
          Err(e) => {
            errors.push(e);
            out.push_str(m.as_str());
          }
        }
        last = m.end();
      }
      out.push_str(&s[last..]);
      *value = Value::String(out);
    }
    Value::Array(items) => items
      .iter_mut()
      .for_each(|v| substitute_value(v, binds, errors)),
    Value::Object(map) => map
      .values_mut()
      .for_each(|v| substitute_value(v, binds, errors)),
    _ => {}
  }
}

/// One step of an argument path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
  Key(String),
  Index(usize),
}

/// Parses `a:b[0]:c` into key and index segments.
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>, String> {
  let mut segments = vec![];
  for part in path.split(':') {
    let (key, mut rest) = match part.find('[') {
      Some(i) => (&part[..i], &part[i..]),
      None => (part, ""),
    };
    if key.is_empty() {
      return Err(format!("Invalid argument path '{path}'"));
    }
    segments.push(PathSegment::Key(key.to_string()));
    while !rest.is_empty() {
      let close = rest
        .find(']')
        .filter(|_| rest.starts_with('['))
        .ok_or_else(|| format!("Invalid argument path '{path}'"))?;
      let index = rest[1..close]
        .trim()
        .parse::<usize>()
        .map_err(|_| format!("Invalid index in argument path '{path}'"))?;
      segments.push(PathSegment::Index(index));
      rest = &rest[close + 1..];
    }
  }
  Ok(segments)
}

pub fn get_path<'a>(value: &'a Value, path: &[PathSegment]) -> Option<&'a Value> {
  path.iter().try_fold(value, |v, seg| match seg {
    PathSegment::Key(k) => v.get(k.as_str()),
    PathSegment::Index(i) => v.get(*i),
  })
}

/// Writes `new` at `target` inside `kwargs`, creating intermediate containers.
pub fn set_path(kwargs: &mut Kwargs, target: &str, new: Value) -> Result<(), String> {
  let path = parse_path(target)?;
  let mut root = Value::Object(std::mem::take(kwargs));
  let outcome = set_in(&mut root, &path, new).map_err(|e| format!("Cannot set '{target}': {e}"));
  if let Value::Object(map) = root {
    *kwargs = map;
  }
  outcome
}

fn set_in(slot: &mut Value, path: &[PathSegment], new: Value) -> Result<(), String> {
  let Some((first, rest)) = path.split_first() else {
    *slot = new;
    return Ok(());
  };
  let child = match first {
    PathSegment::Key(k) => {
      if slot.is_null() {
        *slot = Value::Object(Default::default());
      }
      let map = slot
        .as_object_mut()
        .ok_or_else(|| format!("'{k}' is not inside an object"))?;
      map.entry(k.clone()).or_insert(Value::Null)
    }
    PathSegment::Index(i) => {
      if slot.is_null() {
        *slot = Value::Array(vec![]);
      }
      let items = slot
        .as_array_mut()
        .ok_or_else(|| format!("[{i}] is not inside a list"))?;
      if *i == items.len() {
        items.push(Value::Null);
      }
      items
        .get_mut(*i)
        .ok_or_else(|| format!("index {i} out of range"))?
    }
  };
  set_in(child, rest, new)
}
