//! Shell-style name matching (`*`, `?`, `[...]`) used when resolving requisite targets.

use regex::Regex;
use tracing::warn;

/// Returns true if the pattern contains glob metacharacters.
pub(crate) fn has_magic(pattern: &str) -> bool {
  pattern.contains(['*', '?', '['])
}

/// Translates a glob pattern into an anchored regular expression.
pub(crate) fn translate(pattern: &str) -> String {
  let mut out = String::from("^");
  let chars: Vec<char> = pattern.chars().collect();
  let mut i = 0;
  while i < chars.len() {
    match chars[i] {
      '*' => out.push_str(".*"),
      '?' => out.push('.'),
      '[' => {
        // A `]` right after `[` or `[!` belongs to the class.
        let mut j = i + 1;
        if chars.get(j) == Some(&'!') {
          j += 1;
        }
        if chars.get(j) == Some(&']') {
          j += 1;
        }
        match chars[j..].iter().position(|c| *c == ']') {
          Some(rel) => {
            let end = j + rel;
            let mut body = &chars[i + 1..end];
            out.push('[');
            if let Some((&'!', rest)) = body.split_first() {
              out.push('^');
              body = rest;
            }
            push_class_body(&mut out, body);
            out.push(']');
            i = end;
          }
          None => out.push_str("\\["),
        }
      }
      c => out.push_str(&regex::escape(&c.to_string())),
    }
    i += 1;
  }
  out.push('$');
  out
}

/// Class members are literal except `-` ranges. Escapes what the regex
/// engine would read as negation, nesting or set operations.
fn push_class_body(out: &mut String, body: &[char]) {
  let mut prev = None;
  for &c in body {
    match c {
      '\\' | '[' | ']' | '^' | '&' | '~' => {
        out.push('\\');
        out.push(c);
      }
      '-' if prev == Some('-') => out.push_str("\\-"),
      c => out.push(c),
    }
    prev = Some(c);
  }
}

/// Matches `text` against a glob `pattern`. Literal patterns compare by equality.
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
  if !has_magic(pattern) {
    return pattern == text;
  }
  match Regex::new(&translate(pattern)) {
    Ok(re) => re.is_match(text),
    Err(e) => {
      warn!(pattern, error = %e, "invalid glob pattern, falling back to literal match");
      pattern == text
    }
  }
}
