//! Small helpers shared by every hand-written decode/encode impl in
//! `entities::compose`. The codec intentionally does not derive
//! `Serialize`/`Deserialize` on the compose types: §4.1 requires that
//! unknown keys round-trip at the same tree position, which a plain
//! derive cannot give us. Every node type instead walks a
//! `serde_yaml_ng::Mapping` by hand, pulling out the fields it knows
//! about and keeping the rest in an `Extra` bag.

use indexmap::IndexMap;
use serde_yaml_ng::{Mapping, Value};

/// Unknown keys preserved at a single node, in the order they were read.
pub type Extra = IndexMap<String, Value>;

/// Splits a mapping into the subset of entries whose key is in
/// `known_keys` and everything else (the `Extra` bag), preserving the
/// original relative order of the unknown entries.
pub fn split_mapping(map: Mapping, known_keys: &[&str]) -> (IndexMap<String, Value>, Extra) {
  let mut known = IndexMap::new();
  let mut extra = Extra::new();
  for (k, v) in map {
    let key_str = match k.as_str() {
      Some(s) => s.to_string(),
      // Compose keys are always strings in practice; fall back to the
      // YAML debug form so a stray non-string key is not silently lost.
      None => format!("{k:?}"),
    };
    if known_keys.contains(&key_str.as_str()) {
      known.insert(key_str, v);
    } else {
      extra.insert(key_str, v);
    }
  }
  (known, extra)
}

/// Builds a mapping in the documented emission order: the given schema
/// fields (already in documented order, `None` entries skipped), then
/// the `x-sb-*` entries in `extra` sorted by key, then the remaining
/// `extra` entries in original order.
pub fn build_mapping(schema_fields: Vec<(&str, Option<Value>)>, extra: &Extra) -> Mapping {
  let mut map = Mapping::new();
  for (key, value) in schema_fields {
    if let Some(value) = value {
      map.insert(Value::String(key.to_string()), value);
    }
  }
  let mut xsb: Vec<(&String, &Value)> = extra.iter().filter(|(k, _)| k.starts_with("x-sb-")).collect();
  xsb.sort_by(|(a, _), (b, _)| a.cmp(b));
  for (key, value) in xsb {
    map.insert(Value::String(key.clone()), value.clone());
  }
  for (key, value) in extra.iter().filter(|(k, _)| !k.starts_with("x-sb-")) {
    map.insert(Value::String(key.clone()), value.clone());
  }
  map
}

/// Coerces a scalar `Value` to its string form the way compose documents
/// do when a field is written as a bare YAML scalar (e.g. a sysctl value
/// written as `1024` rather than `"1024"`).
pub fn scalar_to_string(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    Value::Null => Some(String::new()),
    _ => None,
  }
}

pub fn as_str(value: &Value) -> Option<&str> {
  value.as_str()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn split_mapping_preserves_unknown_order() {
    let yaml = "a: 1\nb: 2\nc: 3\nd: 4\n";
    let map: Mapping = serde_yaml_ng::from_str(yaml).unwrap();
    let (known, extra) = split_mapping(map, &["a", "c"]);
    assert_eq!(known.len(), 2);
    let extra_keys: Vec<&str> = extra.keys().map(String::as_str).collect();
    assert_eq!(extra_keys, vec!["b", "d"]);
  }

  #[test]
  fn build_mapping_orders_xsb_then_extra() {
    let mut extra = Extra::new();
    extra.insert("x-sb-groups".to_string(), Value::Null);
    extra.insert("custom".to_string(), Value::Null);
    extra.insert("x-sb-aaa".to_string(), Value::Null);
    let map = build_mapping(vec![("image", Some(Value::String("x".into())))], &extra);
    let keys: Vec<String> = map.keys().map(|k| k.as_str().unwrap().to_string()).collect();
    assert_eq!(keys, vec!["image", "x-sb-aaa", "x-sb-groups", "custom"]);
  }
}
