//! Builds each service's final `environment` map (spec.md §4.3) in
//! last-wins order: `env_file` entries, service `environment`,
//! aggregated overlay environment, then the process-env allowlist.

use std::collections::HashSet;
use std::path::Path;

use indexmap::IndexMap;
use swarmbender_client::entities::union::ListOrMap;
use swarmbender_client::error::SbError;

/// Parses one compose-style `.env` file per spec.md §4.3's rules:
/// UTF-8, one `KEY=VALUE` per line, `#` comments outside quotes,
/// `export ` stripped, double-quoted values interpret escapes,
/// single-quoted values are literal, a bare `KEY` yields an empty
/// value. Keys must match `[A-Za-z_][A-Za-z0-9_]*`; non-matching lines
/// are skipped.
pub fn parse_env_file(contents: &str) -> IndexMap<String, String> {
  let mut out = IndexMap::new();
  for raw_line in contents.lines() {
    let line = raw_line.trim();
    if line.is_empty() || line.starts_with('#') {
      continue;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let Some((key, raw_value)) = line.split_once('=') else {
      if is_valid_key(line) {
        out.insert(line.to_string(), String::new());
      }
      continue;
    };
    let key = key.trim();
    if !is_valid_key(key) {
      continue;
    }
    out.insert(key.to_string(), unquote(raw_value.trim()));
  }
  out
}

fn is_valid_key(key: &str) -> bool {
  let mut chars = key.chars();
  match chars.next() {
    Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
    _ => return false,
  }
  chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

fn unquote(value: &str) -> String {
  if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
    let inner = &value[1..value.len() - 1];
    return unescape_double_quoted(inner);
  }
  if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
    return value[1..value.len() - 1].to_string();
  }
  // Unquoted value: strip a trailing inline comment the way compose's
  // own dotenv parser does (` # comment` after whitespace).
  match value.split_once(" #") {
    Some((before, _)) => before.trim_end().to_string(),
    None => value.to_string(),
  }
}

fn unescape_double_quoted(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  let mut chars = s.chars().peekable();
  while let Some(c) = chars.next() {
    if c != '\\' {
      out.push(c);
      continue;
    }
    match chars.next() {
      Some('n') => out.push('\n'),
      Some('r') => out.push('\r'),
      Some('t') => out.push('\t'),
      Some('\\') => out.push('\\'),
      Some('"') => out.push('"'),
      Some(other) => {
        out.push('\\');
        out.push(other);
      }
      None => out.push('\\'),
    }
  }
  out
}

/// The process-env allowlist at `stacks/all/<env>/env/use-envvars.json`
/// (spec.md §4.3): a JSON array of names, or an object whose keys are
/// the allowed names.
pub fn parse_use_envvars(contents: &str) -> Result<HashSet<String>, SbError> {
  let value: serde_json::Value = serde_json::from_str(contents).map_err(|e| {
    SbError::SchemaViolation {
      path: Path::new("use-envvars.json").to_path_buf(),
      reason: e.to_string(),
    }
  })?;
  let names = match value {
    serde_json::Value::Array(items) => items.into_iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
    serde_json::Value::Object(map) => map.into_keys().collect(),
    _ => HashSet::new(),
  };
  Ok(names)
}

/// Builds the final environment for one service from its layered
/// sources, in last-wins order.
pub struct EnvironmentBuilder<'a> {
  pub env_files: Vec<IndexMap<String, String>>,
  pub service_environment: Option<&'a ListOrMap>,
  pub aggregated_overlay: &'a IndexMap<String, String>,
  pub allowlisted_process_env: &'a IndexMap<String, String>,
  pub use_envvars: &'a HashSet<String>,
}

impl<'a> EnvironmentBuilder<'a> {
  pub fn build(&self) -> IndexMap<String, String> {
    let mut out = IndexMap::new();
    for file in &self.env_files {
      for (k, v) in file {
        out.insert(k.clone(), v.clone());
      }
    }
    if let Some(service_env) = self.service_environment {
      for (k, v) in service_env.to_map() {
        out.insert(k, v.unwrap_or_default());
      }
    }
    for (k, v) in self.aggregated_overlay {
      out.insert(k.clone(), v.clone());
    }
    for name in self.use_envvars {
      if let Some(value) = self.allowlisted_process_env.get(name) {
        out.insert(name.clone(), value.clone());
      }
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_env_file_handles_quoting_and_export() {
    let contents = "export FOO=\"a\\nb\"\nBAR='literal \\n'\nBAZ\n# comment\nQUX=plain\n";
    let parsed = parse_env_file(contents);
    assert_eq!(parsed.get("FOO"), Some(&"a\nb".to_string()));
    assert_eq!(parsed.get("BAR"), Some(&"literal \\n".to_string()));
    assert_eq!(parsed.get("BAZ"), Some(&String::new()));
    assert_eq!(parsed.get("QUX"), Some(&"plain".to_string()));
  }

  #[test]
  fn parse_env_file_rejects_invalid_keys() {
    let parsed = parse_env_file("1INVALID=x\nVALID_KEY=y\n");
    assert!(!parsed.contains_key("1INVALID"));
    assert_eq!(parsed.get("VALID_KEY"), Some(&"y".to_string()));
  }

  #[test]
  fn parse_use_envvars_accepts_array_or_object() {
    let from_array = parse_use_envvars("[\"A\", \"B\"]").unwrap();
    assert!(from_array.contains("A") && from_array.contains("B"));
    let from_object = parse_use_envvars("{\"A\": true, \"B\": false}").unwrap();
    assert!(from_object.contains("A") && from_object.contains("B"));
  }

  #[test]
  fn last_wins_order_is_env_file_then_service_then_overlay_then_process() {
    let mut env_file = IndexMap::new();
    env_file.insert("FOO".to_string(), "from-file".to_string());
    let service_env = ListOrMap::Map(IndexMap::from([("FOO".to_string(), Some("from-service".to_string()))]));
    let mut overlay = IndexMap::new();
    overlay.insert("FOO".to_string(), "from-overlay".to_string());
    let mut process_env = IndexMap::new();
    process_env.insert("FOO".to_string(), "from-process".to_string());
    let mut use_envvars = HashSet::new();
    use_envvars.insert("FOO".to_string());

    let builder = EnvironmentBuilder {
      env_files: vec![env_file],
      service_environment: Some(&service_env),
      aggregated_overlay: &overlay,
      allowlisted_process_env: &process_env,
      use_envvars: &use_envvars,
    };
    assert_eq!(builder.build().get("FOO"), Some(&"from-process".to_string()));
  }
}
