//! Token expansion (spec.md §4.7): `${NAME}`, `${NAME:-default}`, and
//! `${ENVVARS}` substituted over a compose document's string tree.

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use serde_yaml_ng::Value;
use swarmbender_client::error::SbError;

fn token_pattern() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}").unwrap())
}

/// Expands `${ENVVARS}` to `K1=V1 K2=V2 ...` (stable insertion order)
/// before the general `${NAME}`/`${NAME:-default}` pass runs, since
/// `ENVVARS` is not itself a lookup key in the environment map.
pub fn envvars_literal(env: &IndexMap<String, String>) -> String {
  env.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(" ")
}

/// Expands all tokens in `text` against `env` (service env ∪ process-env
/// allowlist ∪ user tokens, already merged by the caller). `location` is
/// used only to annotate an `UnresolvedToken` error.
pub fn expand_string(text: &str, env: &IndexMap<String, String>, location: &str) -> Result<String, SbError> {
  if text == "${ENVVARS}" || text.contains("${ENVVARS}") {
    let replaced = text.replace("${ENVVARS}", &envvars_literal(env));
    return expand_string_without_envvars(&replaced, env, location);
  }
  expand_string_without_envvars(text, env, location)
}

fn expand_string_without_envvars(text: &str, env: &IndexMap<String, String>, location: &str) -> Result<String, SbError> {
  let mut err: Option<SbError> = None;
  let result = token_pattern().replace_all(text, |caps: &regex::Captures| {
    let name = &caps[1];
    let default = caps.get(3).map(|m| m.as_str());
    match (env.get(name), default) {
      (Some(value), _) if !value.is_empty() => value.clone(),
      (_, Some(default)) => default.to_string(),
      (Some(empty), None) => empty.clone(),
      (None, None) => {
        if err.is_none() {
          err = Some(SbError::UnresolvedToken {
            name: name.to_string(),
            location: location.to_string(),
          });
        }
        String::new()
      }
    }
  });
  match err {
    Some(e) => Err(e),
    None => Ok(result.into_owned()),
  }
}

/// Walks a `serde_yaml_ng::Value` tree, expanding tokens in every string
/// scalar (keys are left untouched; compose never templates key names).
pub fn expand_value(value: Value, env: &IndexMap<String, String>, location: &str) -> Result<Value, SbError> {
  match value {
    Value::String(s) => Ok(Value::String(expand_string(&s, env, location)?)),
    Value::Sequence(seq) => Ok(Value::Sequence(
      seq
        .into_iter()
        .map(|v| expand_value(v, env, location))
        .collect::<Result<Vec<_>, _>>()?,
    )),
    Value::Mapping(map) => {
      let mut out = serde_yaml_ng::Mapping::new();
      for (k, v) in map {
        out.insert(k, expand_value(v, env, location)?);
      }
      Ok(Value::Mapping(out))
    }
    other => Ok(other),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn env(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
  }

  #[test]
  fn default_substitutes_when_missing() {
    let result = expand_string("${API_HOST:-localhost}", &env(&[]), "services.api.environment.URL").unwrap();
    assert_eq!(result, "localhost");
  }

  #[test]
  fn missing_without_default_is_unresolved() {
    let err = expand_string("${API_HOST}", &env(&[]), "services.api.environment.URL").unwrap_err();
    assert!(matches!(err, SbError::UnresolvedToken { name, .. } if name == "API_HOST"));
  }

  #[test]
  fn envvars_expands_in_stable_order() {
    let e = env(&[("FOO", "1"), ("BAR", "2")]);
    let result = expand_string("${ENVVARS}", &e, "x").unwrap();
    assert_eq!(result, "FOO=1 BAR=2");
  }
}
