//! The lossless "duck-typed" union types from spec.md §3. Each is a
//! tagged sum decoded by probing variants in a fixed order (scalar,
//! then sequence, then mapping) and re-emitted in whichever variant it
//! was read as — callers that build a value directly (e.g. the merge
//! engine normalizing to map form) pick the variant explicitly instead
//! of probing.
//!
//! Re-architecture note (spec.md §9): these used to be duck-typed nodes
//! probed with dynamic type checks at every use site. Representing them
//! as a closed enum means every consumer pattern-matches once, at the
//! boundary, instead of re-deriving "is this a list or a map" logic
//! throughout the codebase.

use std::fmt;

use indexmap::IndexMap;
use serde_yaml_ng::Value;

fn type_name(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "bool",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Sequence(_) => "sequence",
    Value::Mapping(_) => "mapping",
    Value::Tagged(_) => "tagged",
  }
}

#[derive(Debug, thiserror::Error)]
#[error("expected {expected} for {field}, found {found}")]
pub struct UnionDecodeError {
  pub field: &'static str,
  pub expected: &'static str,
  pub found: &'static str,
}

fn err(field: &'static str, expected: &'static str, value: &Value) -> UnionDecodeError {
  UnionDecodeError {
    field,
    expected,
    found: type_name(value),
  }
}

/// `{scalar: string} | {list: sequence of string}`.
/// Used for `command`, `entrypoint`, `env_file`, `dns`, `healthcheck.test`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarOrList {
  Scalar(String),
  List(Vec<String>),
}

impl ScalarOrList {
  pub fn decode(field: &'static str, value: &Value) -> Result<Self, UnionDecodeError> {
    if let Some(s) = value.as_str() {
      return Ok(Self::Scalar(s.to_string()));
    }
    if let Value::Sequence(seq) = value {
      let items = seq
        .iter()
        .map(|v| {
          v.as_str()
            .map(str::to_string)
            .ok_or_else(|| err(field, "scalar-or-list", v))
        })
        .collect::<Result<Vec<_>, _>>()?;
      return Ok(Self::List(items));
    }
    Err(err(field, "scalar-or-list", value))
  }

  pub fn encode(&self) -> Value {
    match self {
      Self::Scalar(s) => Value::String(s.clone()),
      Self::List(items) => Value::Sequence(items.iter().cloned().map(Value::String).collect()),
    }
  }

  pub fn as_list(&self) -> Vec<String> {
    match self {
      Self::Scalar(s) => vec![s.clone()],
      Self::List(items) => items.clone(),
    }
  }
}

/// `{list: sequence of "K=V" or "K"} | {map: mapping K -> V, V may be empty}`.
/// Used for `environment`, `labels`, `deploy.labels`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListOrMap {
  List(Vec<String>),
  Map(IndexMap<String, Option<String>>),
}

impl ListOrMap {
  pub fn decode(field: &'static str, value: &Value) -> Result<Self, UnionDecodeError> {
    if let Value::Sequence(seq) = value {
      let items = seq
        .iter()
        .map(|v| {
          v.as_str()
            .map(str::to_string)
            .ok_or_else(|| err(field, "list-or-map", v))
        })
        .collect::<Result<Vec<_>, _>>()?;
      return Ok(Self::List(items));
    }
    if let Value::Mapping(map) = value {
      let mut out = IndexMap::new();
      for (k, v) in map {
        let key = k.as_str().ok_or_else(|| err(field, "list-or-map", k))?.to_string();
        let val = match v {
          Value::Null => None,
          other => Some(
            crate::entities::yaml_ext::scalar_to_string(other).ok_or_else(|| err(field, "list-or-map", other))?,
          ),
        };
        out.insert(key, val);
      }
      return Ok(Self::Map(out));
    }
    Err(err(field, "list-or-map", value))
  }

  pub fn encode(&self) -> Value {
    match self {
      Self::List(items) => Value::Sequence(items.iter().cloned().map(Value::String).collect()),
      Self::Map(map) => {
        let mut out = serde_yaml_ng::Mapping::new();
        for (k, v) in map {
          out.insert(
            Value::String(k.clone()),
            v.clone().map(Value::String).unwrap_or(Value::Null),
          );
        }
        Value::Mapping(out)
      }
    }
  }

  /// Normalizes either variant to map form. `KEY=VALUE` entries split at
  /// the first `=`; a bare `KEY` entry (no `=`) yields an empty value.
  pub fn to_map(&self) -> IndexMap<String, Option<String>> {
    match self {
      Self::Map(map) => map.clone(),
      Self::List(items) => items
        .iter()
        .map(|item| match item.split_once('=') {
          Some((k, v)) => (k.to_string(), Some(v.to_string())),
          None => (item.clone(), None),
        })
        .collect(),
    }
  }

  /// Rebuilds this variant's shape (list or map) from a freshly computed
  /// map, so a later merge/environment stage can emit in the variant the
  /// overlay originally used.
  pub fn from_map_like(&self, map: IndexMap<String, Option<String>>) -> Self {
    match self {
      Self::List(_) => Self::List(
        map
          .into_iter()
          .map(|(k, v)| match v {
            Some(v) => format!("{k}={v}"),
            None => k,
          })
          .collect(),
      ),
      Self::Map(_) => Self::Map(map),
    }
  }
}

impl fmt::Display for ListOrMap {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:?}", self)
  }
}

/// `{list: ["host:ip"]} | {map: host -> ip}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraHosts {
  List(Vec<String>),
  Map(IndexMap<String, String>),
}

impl ExtraHosts {
  pub fn decode(value: &Value) -> Result<Self, UnionDecodeError> {
    if let Value::Sequence(seq) = value {
      let items = seq
        .iter()
        .map(|v| {
          v.as_str()
            .map(str::to_string)
            .ok_or_else(|| err("extra_hosts", "list-or-map", v))
        })
        .collect::<Result<Vec<_>, _>>()?;
      return Ok(Self::List(items));
    }
    if let Value::Mapping(map) = value {
      let mut out = IndexMap::new();
      for (k, v) in map {
        let key = k.as_str().ok_or_else(|| err("extra_hosts", "list-or-map", k))?;
        let val = v.as_str().ok_or_else(|| err("extra_hosts", "list-or-map", v))?;
        out.insert(key.to_string(), val.to_string());
      }
      return Ok(Self::Map(out));
    }
    Err(err("extra_hosts", "list-or-map", value))
  }

  pub fn encode(&self) -> Value {
    match self {
      Self::List(items) => Value::Sequence(items.iter().cloned().map(Value::String).collect()),
      Self::Map(map) => {
        let mut out = serde_yaml_ng::Mapping::new();
        for (k, v) in map {
          out.insert(Value::String(k.clone()), Value::String(v.clone()));
        }
        Value::Mapping(out)
      }
    }
  }
}

/// A single network attachment under the `map` variant of
/// [`ServiceNetworks`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkAttachment {
  pub aliases: Vec<String>,
  pub priority: Option<i64>,
  pub ipv4_address: Option<String>,
  pub ipv6_address: Option<String>,
  pub link_local_ips: Vec<String>,
}

impl NetworkAttachment {
  fn decode(value: &Value) -> Result<Self, UnionDecodeError> {
    if matches!(value, Value::Null) {
      return Ok(Self::default());
    }
    let Value::Mapping(map) = value else {
      return Err(err("networks", "mapping", value));
    };
    let mut out = Self::default();
    for (k, v) in map {
      match k.as_str() {
        Some("aliases") => {
          if let Value::Sequence(seq) = v {
            out.aliases = seq.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
          }
        }
        Some("priority") => out.priority = v.as_i64(),
        Some("ipv4_address") => out.ipv4_address = v.as_str().map(str::to_string),
        Some("ipv6_address") => out.ipv6_address = v.as_str().map(str::to_string),
        Some("link_local_ips") => {
          if let Value::Sequence(seq) = v {
            out.link_local_ips = seq.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
          }
        }
        _ => {}
      }
    }
    Ok(out)
  }

  fn encode(&self) -> Value {
    let mut map = serde_yaml_ng::Mapping::new();
    if !self.aliases.is_empty() {
      map.insert(
        Value::String("aliases".into()),
        Value::Sequence(self.aliases.iter().cloned().map(Value::String).collect()),
      );
    }
    if let Some(p) = self.priority {
      map.insert(Value::String("priority".into()), Value::Number(p.into()));
    }
    if let Some(v) = &self.ipv4_address {
      map.insert(Value::String("ipv4_address".into()), Value::String(v.clone()));
    }
    if let Some(v) = &self.ipv6_address {
      map.insert(Value::String("ipv6_address".into()), Value::String(v.clone()));
    }
    if !self.link_local_ips.is_empty() {
      map.insert(
        Value::String("link_local_ips".into()),
        Value::Sequence(self.link_local_ips.iter().cloned().map(Value::String).collect()),
      );
    }
    Value::Mapping(map)
  }
}

/// `{list: [name]} | {map: name -> attachment}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceNetworks {
  List(Vec<String>),
  Map(IndexMap<String, NetworkAttachment>),
}

impl ServiceNetworks {
  pub fn decode(value: &Value) -> Result<Self, UnionDecodeError> {
    if let Value::Sequence(seq) = value {
      let items = seq
        .iter()
        .map(|v| {
          v.as_str()
            .map(str::to_string)
            .ok_or_else(|| err("networks", "list-or-map", v))
        })
        .collect::<Result<Vec<_>, _>>()?;
      return Ok(Self::List(items));
    }
    if let Value::Mapping(map) = value {
      let mut out = IndexMap::new();
      for (k, v) in map {
        let key = k.as_str().ok_or_else(|| err("networks", "list-or-map", k))?;
        out.insert(key.to_string(), NetworkAttachment::decode(v)?);
      }
      return Ok(Self::Map(out));
    }
    Err(err("networks", "list-or-map", value))
  }

  pub fn encode(&self) -> Value {
    match self {
      Self::List(items) => Value::Sequence(items.iter().cloned().map(Value::String).collect()),
      Self::Map(map) => {
        let mut out = serde_yaml_ng::Mapping::new();
        for (k, v) in map {
          out.insert(Value::String(k.clone()), v.encode());
        }
        Value::Mapping(out)
      }
    }
  }
}

/// `{bool} | {name: string}`. Collapses to truthy-external iff either
/// variant signals so.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalDef {
  Bool(bool),
  Name(String),
}

impl ExternalDef {
  pub fn decode(value: &Value) -> Result<Self, UnionDecodeError> {
    if let Value::Bool(b) = value {
      return Ok(Self::Bool(*b));
    }
    if let Value::Mapping(map) = value {
      if let Some(name) = map.get("name").and_then(Value::as_str) {
        return Ok(Self::Name(name.to_string()));
      }
      return Ok(Self::Bool(true));
    }
    Err(err("external", "bool-or-mapping", value))
  }

  pub fn encode(&self) -> Value {
    match self {
      Self::Bool(b) => Value::Bool(*b),
      Self::Name(name) => {
        let mut map = serde_yaml_ng::Mapping::new();
        map.insert(Value::String("name".into()), Value::String(name.clone()));
        Value::Mapping(map)
      }
    }
  }

  pub fn is_external(&self) -> bool {
    match self {
      Self::Bool(b) => *b,
      Self::Name(_) => true,
    }
  }

  pub fn name(&self) -> Option<&str> {
    match self {
      Self::Name(n) => Some(n),
      Self::Bool(_) => None,
    }
  }
}

/// `{single: int} | {soft: int, hard: int}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UlimitEntry {
  Single(i64),
  SoftHard { soft: i64, hard: i64 },
}

impl UlimitEntry {
  pub fn decode(value: &Value) -> Result<Self, UnionDecodeError> {
    if let Some(i) = value.as_i64() {
      return Ok(Self::Single(i));
    }
    if let Value::Mapping(map) = value {
      let soft = map
        .get("soft")
        .and_then(Value::as_i64)
        .ok_or_else(|| err("ulimits", "soft/hard mapping", value))?;
      let hard = map
        .get("hard")
        .and_then(Value::as_i64)
        .ok_or_else(|| err("ulimits", "soft/hard mapping", value))?;
      return Ok(Self::SoftHard { soft, hard });
    }
    Err(err("ulimits", "int-or-mapping", value))
  }

  pub fn encode(&self) -> Value {
    match self {
      Self::Single(i) => Value::Number((*i).into()),
      Self::SoftHard { soft, hard } => {
        let mut map = serde_yaml_ng::Mapping::new();
        map.insert(Value::String("soft".into()), Value::Number((*soft).into()));
        map.insert(Value::String("hard".into()), Value::Number((*hard).into()));
        Value::Mapping(map)
      }
    }
  }
}

/// `mapping name -> string`, numeric scalars normalized to string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sysctls(pub IndexMap<String, String>);

impl Sysctls {
  pub fn decode(value: &Value) -> Result<Self, UnionDecodeError> {
    let Value::Mapping(map) = value else {
      return Err(err("sysctls", "mapping", value));
    };
    let mut out = IndexMap::new();
    for (k, v) in map {
      let key = k.as_str().ok_or_else(|| err("sysctls", "mapping", k))?;
      let val = crate::entities::yaml_ext::scalar_to_string(v).ok_or_else(|| err("sysctls", "mapping", v))?;
      out.insert(key.to_string(), val);
    }
    Ok(Self(out))
  }

  pub fn encode(&self) -> Value {
    let mut map = serde_yaml_ng::Mapping::new();
    for (k, v) in &self.0 {
      map.insert(Value::String(k.clone()), Value::String(v.clone()));
    }
    Value::Mapping(map)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn scalar_or_list_round_trips_both_variants() {
    let scalar: Value = serde_yaml_ng::from_str("sh -c foo").unwrap();
    assert_eq!(
      ScalarOrList::decode("command", &scalar).unwrap(),
      ScalarOrList::Scalar("sh -c foo".into())
    );
    let list: Value = serde_yaml_ng::from_str("[sh, -c, foo]").unwrap();
    assert_eq!(
      ScalarOrList::decode("command", &list).unwrap(),
      ScalarOrList::List(vec!["sh".into(), "-c".into(), "foo".into()])
    );
  }

  #[test]
  fn list_or_map_bare_key_yields_empty_value() {
    let value: Value = serde_yaml_ng::from_str("[FOO=bar, BAZ]").unwrap();
    let decoded = ListOrMap::decode("environment", &value).unwrap();
    let map = decoded.to_map();
    assert_eq!(map.get("FOO"), Some(&Some("bar".to_string())));
    assert_eq!(map.get("BAZ"), Some(&None));
  }

  #[test]
  fn external_def_bare_mapping_is_truthy() {
    let value: Value = serde_yaml_ng::from_str("{}").unwrap();
    let decoded = ExternalDef::decode(&value).unwrap();
    assert!(decoded.is_external());
  }

  #[test]
  fn ulimit_entry_decodes_both_shapes() {
    let single: Value = serde_yaml_ng::from_str("1024").unwrap();
    assert_eq!(UlimitEntry::decode(&single).unwrap(), UlimitEntry::Single(1024));
    let both: Value = serde_yaml_ng::from_str("soft: 1024\nhard: 2048").unwrap();
    assert_eq!(
      UlimitEntry::decode(&both).unwrap(),
      UlimitEntry::SoftHard { soft: 1024, hard: 2048 }
    );
  }
}
