pub mod glob;
pub mod hash;
pub mod sanitize;

/// JSON app-settings flattening/un-flattening (spec.md §4.3): nested
/// object keys joined with `__`, arrays flattened with numeric indices.
pub mod flatten {
  use indexmap::IndexMap;
  use serde_json::Value;

  /// Flattens a JSON value into `A__B__C`-style keys. Strings are kept
  /// verbatim, numbers via their lossless text form, booleans as
  /// `true`/`false`, arrays with numeric index segments.
  pub fn flatten_json(value: &Value) -> IndexMap<String, String> {
    let mut out = IndexMap::new();
    flatten_into(value, None, &mut out);
    out
  }

  fn flatten_into(value: &Value, prefix: Option<&str>, out: &mut IndexMap<String, String>) {
    match value {
      Value::Object(map) => {
        for (k, v) in map {
          let key = match prefix {
            Some(p) => format!("{p}__{k}"),
            None => k.clone(),
          };
          flatten_into(v, Some(&key), out);
        }
      }
      Value::Array(items) => {
        for (i, v) in items.iter().enumerate() {
          let key = match prefix {
            Some(p) => format!("{p}__{i}"),
            None => i.to_string(),
          };
          flatten_into(v, Some(&key), out);
        }
      }
      Value::String(s) => {
        if let Some(p) = prefix {
          out.insert(p.to_string(), s.clone());
        }
      }
      Value::Number(n) => {
        if let Some(p) = prefix {
          out.insert(p.to_string(), n.to_string());
        }
      }
      Value::Bool(b) => {
        if let Some(p) = prefix {
          out.insert(p.to_string(), b.to_string());
        }
      }
      Value::Null => {
        if let Some(p) = prefix {
          out.insert(p.to_string(), String::new());
        }
      }
    }
  }

  /// Reconstructs nested JSON from flattened `A__B__C` keys. A group of
  /// sibling keys round-trips as an array only when every key segment at
  /// that level is a contiguous `0..N` numeric sequence; any non-numeric
  /// sibling at the same level disables the array reconstruction for
  /// that level, producing an object with string keys instead.
  pub fn unflatten_json(flat: &IndexMap<String, String>) -> Value {
    let mut root = Value::Object(serde_json::Map::new());
    for (key, value) in flat {
      let segments: Vec<&str> = key.split("__").collect();
      insert_path(&mut root, &segments, value);
    }
    densify(root)
  }

  fn insert_path(node: &mut Value, segments: &[&str], value: &str) {
    let Value::Object(map) = node else { return };
    let (head, rest) = segments.split_first().expect("non-empty key");
    if rest.is_empty() {
      map.insert(head.to_string(), parse_scalar(value));
      return;
    }
    let entry = map
      .entry(head.to_string())
      .or_insert_with(|| Value::Object(serde_json::Map::new()));
    insert_path(entry, rest, value);
  }

  fn parse_scalar(value: &str) -> Value {
    if value.is_empty() {
      return Value::Null;
    }
    if let Ok(i) = value.parse::<i64>() {
      return Value::Number(i.into());
    }
    if let Ok(f) = value.parse::<f64>() {
      if let Some(n) = serde_json::Number::from_f64(f) {
        return Value::Number(n);
      }
    }
    match value {
      "true" => Value::Bool(true),
      "false" => Value::Bool(false),
      _ => Value::String(value.to_string()),
    }
  }

  /// Recursively converts any object whose keys are a contiguous
  /// `0..N` numeric sequence into an array.
  fn densify(value: Value) -> Value {
    match value {
      Value::Object(map) => {
        let densified: serde_json::Map<String, Value> = map.into_iter().map(|(k, v)| (k, densify(v))).collect();
        if is_dense_numeric(&densified) {
          let mut entries: Vec<(usize, Value)> = densified
            .into_iter()
            .map(|(k, v)| (k.parse::<usize>().expect("checked numeric"), v))
            .collect();
          entries.sort_by_key(|(i, _)| *i);
          Value::Array(entries.into_iter().map(|(_, v)| v).collect())
        } else {
          Value::Object(densified)
        }
      }
      other => other,
    }
  }

  fn is_dense_numeric(map: &serde_json::Map<String, Value>) -> bool {
    if map.is_empty() {
      return false;
    }
    let mut indices: Vec<usize> = Vec::with_capacity(map.len());
    for key in map.keys() {
      match key.parse::<usize>() {
        Ok(i) => indices.push(i),
        Err(_) => return false,
      }
    }
    indices.sort_unstable();
    indices.iter().enumerate().all(|(i, v)| i == *v)
  }

  #[cfg(test)]
  mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_nested_objects_and_arrays() {
      let input = json!({"ConnectionStrings": {"Main": "x"}, "Redis": {"Hosts": ["a", "b"]}});
      let flat = flatten_json(&input);
      assert_eq!(flat.get("ConnectionStrings__Main").map(String::as_str), Some("x"));
      assert_eq!(flat.get("Redis__Hosts__0").map(String::as_str), Some("a"));
      assert_eq!(flat.get("Redis__Hosts__1").map(String::as_str), Some("b"));
    }

    #[test]
    fn unflatten_restores_arrays() {
      let mut flat = IndexMap::new();
      flat.insert("Redis__Hosts__0".to_string(), "a".to_string());
      flat.insert("Redis__Hosts__1".to_string(), "b".to_string());
      let restored = unflatten_json(&flat);
      assert_eq!(restored, json!({"Redis": {"Hosts": ["a", "b"]}}));
    }

    #[test]
    fn mixed_numeric_and_string_keys_disable_array_round_trip() {
      let mut flat = IndexMap::new();
      flat.insert("Group__0".to_string(), "a".to_string());
      flat.insert("Group__extra".to_string(), "b".to_string());
      let restored = unflatten_json(&flat);
      assert_eq!(restored, json!({"Group": {"0": "a", "extra": "b"}}));
    }
  }
}
