//! Name-safety helpers: the output filename sanitizer (spec.md §6) and
//! the Swarm-safe secret name normalizer (spec.md §4.6).

use regex::Regex;
use std::sync::OnceLock;

use super::hash::sha8;

fn non_alnum_run() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap())
}

fn repeat_run() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"[._-]{2,}").unwrap())
}

fn name_shape() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9._-]{0,62})[A-Za-z0-9]$").unwrap())
}

/// `sanitize(stack)` / `sanitize(env)` for the output filename:
/// replaces path separators with `-`, maps empty to `unknown`.
pub fn sanitize_path_component(value: &str) -> String {
  if value.is_empty() {
    return "unknown".to_string();
  }
  value.replace(['/', '\\'], "-")
}

fn trim_to_alnum_edges(s: &str) -> String {
  let start = s.find(|c: char| c.is_ascii_alphanumeric());
  let Some(start) = start else { return String::new() };
  let end = s.rfind(|c: char| c.is_ascii_alphanumeric()).unwrap();
  s[start..=end].to_string()
}

/// Normalizes a candidate secret name to the Swarm-safe alphabet:
/// `[A-Za-z0-9._-]`, collapsing runs of other characters to `_`,
/// collapsing repeated separators, and trimming to alphanumeric edges.
/// Does not perform the length clamp; see [`clamp_to_64`].
pub fn normalize_swarm_name(candidate: &str) -> String {
  let replaced = non_alnum_run().replace_all(candidate, "_");
  let collapsed = repeat_run().replace_all(&replaced, |caps: &regex::Captures| {
    caps[0].chars().next().unwrap().to_string()
  });
  trim_to_alnum_edges(&collapsed)
}

/// If `name` exceeds 64 chars, keeps a 24-char prefix and 24-char
/// suffix, replaces the removed middle with the first 8 hex chars of
/// SHA-256 of that removed middle, hard-truncates to 64, then re-trims
/// to alphanumeric edges (spec.md §4.6).
pub fn clamp_to_64(name: &str) -> String {
  if name.len() <= 64 {
    return name.to_string();
  }
  let chars: Vec<char> = name.chars().collect();
  let prefix: String = chars[..24].iter().collect();
  let suffix: String = chars[chars.len() - 24..].iter().collect();
  let middle: String = chars[24..chars.len() - 24].iter().collect();
  let replacement = sha8(&middle);
  let combined = format!("{prefix}{replacement}{suffix}");
  let truncated: String = combined.chars().take(64).collect();
  trim_to_alnum_edges(&truncated)
}

pub fn matches_name_shape(name: &str) -> bool {
  name.len() <= 64 && name_shape().is_match(name)
}

/// Normalizes then clamps; if the result still fails the final name
/// shape, the caller should fall back to the documented
/// `sb_<slug>_..._<sha8>` scheme and re-run this function on it.
pub fn normalize_and_clamp(candidate: &str) -> String {
  clamp_to_64(&normalize_swarm_name(candidate))
}

/// Lowercases and replaces non-alnum runs with `-`, used when building
/// the fallback name's `<slug(stack)>`/`<slug(svc)>` components.
pub fn slug(value: &str) -> String {
  let lower = value.to_ascii_lowercase();
  let replaced = non_alnum_run().replace_all(&lower, "-");
  trim_to_alnum_edges(&replaced)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sanitize_path_component_handles_separators_and_empty() {
    assert_eq!(sanitize_path_component("a/b\\c"), "a-b-c");
    assert_eq!(sanitize_path_component(""), "unknown");
  }

  #[test]
  fn normalize_swarm_name_collapses_and_trims() {
    let normalized = normalize_swarm_name("--foo!!bar__baz--");
    assert!(matches_name_shape(&normalized) || normalized.len() <= 64);
    assert!(!normalized.starts_with('-'));
    assert!(!normalized.starts_with('_'));
  }

  #[test]
  fn clamp_to_64_keeps_prefix_and_suffix() {
    let long_name = format!("a{}", "x".repeat(100));
    let clamped = clamp_to_64(&long_name);
    assert!(clamped.len() <= 64);
    assert!(clamped.starts_with("ax"));
  }

  #[test]
  fn name_shape_matches_spec_regex() {
    assert!(matches_name_shape("sb_demo_api_dev_abc123"));
    assert!(!matches_name_shape("_leading-underscore"));
    assert!(!matches_name_shape("trailing-dash-"));
  }
}
