//! Glob/wildcard matching used in two distinct places: overlay file
//! discovery (filesystem globs with `{placeholder}` substitution) and
//! secrets-policy include matching (case-insensitive `*`/`?` glob over
//! flat keys, spec.md §4.5).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use wildcard::Wildcard;

/// Substitutes `{name}` placeholders in an overlay glob template, e.g.
/// `stacks/{stackId}/{env}/stack/*.y?(a)ml`.
pub fn expand_template(template: &str, vars: &BTreeMap<&str, &str>) -> String {
  let mut out = template.to_string();
  for (key, value) in vars {
    out = out.replace(&format!("{{{key}}}"), value);
  }
  out
}

/// The one extglob construct the overlay globs actually use:
/// `*.y?(a)ml`, matching `*.yml` or `*.yaml`. Everything else in an
/// overlay glob is a plain `*`/directory path, so this is handled as a
/// literal special case rather than a general extglob engine.
fn filename_matches(file_name: &str, pattern: &str) -> bool {
  if pattern == "*.y?(a)ml" {
    return file_name.ends_with(".yml") || file_name.ends_with(".yaml");
  }
  Wildcard::new(pattern.as_bytes())
    .map(|w| w.is_match(file_name.as_bytes()))
    .unwrap_or(false)
}

/// Lists files under the directory portion of `pattern` whose name
/// matches the final path segment, sorted lexicographically by file
/// name (spec.md §5 ordering guarantee: "files are enumerated in
/// lexicographic order within each glob"). Returns an empty vec if the
/// directory does not exist.
pub fn list_matching_files(pattern: &str) -> std::io::Result<Vec<PathBuf>> {
  let path = Path::new(pattern);
  let (dir, file_pattern) = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => (parent.to_path_buf(), path.file_name().unwrap().to_string_lossy().to_string()),
    _ => (PathBuf::from("."), pattern.to_string()),
  };
  if !dir.is_dir() {
    return Ok(Vec::new());
  }
  let mut matches = Vec::new();
  for entry in std::fs::read_dir(&dir)? {
    let entry = entry?;
    let file_name = entry.file_name();
    let file_name = file_name.to_string_lossy();
    if entry.file_type()?.is_file() && filename_matches(&file_name, &file_pattern) {
      matches.push(entry.path());
    }
  }
  matches.sort();
  Ok(matches)
}

/// Whether `key` (case-insensitively) matches any of `includes`. An
/// empty include list passes everything (spec.md §4.5).
pub fn key_matches_any_include(key: &str, includes: &[String]) -> bool {
  if includes.is_empty() {
    return true;
  }
  let key_lower = key.to_ascii_lowercase();
  includes.iter().any(|pattern| {
    let pattern_lower = pattern.to_ascii_lowercase();
    Wildcard::new(pattern_lower.as_bytes())
      .map(|w| w.is_match(key_lower.as_bytes()))
      .unwrap_or(false)
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn expand_template_substitutes_placeholders() {
    let mut vars = BTreeMap::new();
    vars.insert("stackId", "payments");
    vars.insert("env", "prod");
    let expanded = expand_template("stacks/{stackId}/{env}/stack/*.y?(a)ml", &vars);
    assert_eq!(expanded, "stacks/payments/prod/stack/*.y?(a)ml");
  }

  #[test]
  fn key_matches_any_include_is_case_insensitive() {
    let includes = vec!["ConnectionStrings__*".to_string()];
    assert!(key_matches_any_include("connectionstrings__main", &includes));
    assert!(!key_matches_any_include("redis__hosts__0", &includes));
  }

  #[test]
  fn empty_includes_pass_everything() {
    assert!(key_matches_any_include("anything", &[]));
  }
}
