//! The deep-merge engine (spec.md §4.2): recursive mapping merge with
//! wholesale-replace on sequence/scalar collision, `environment`/`labels`
//! normalized to map form around the merge, and wildcard (`"*"`)
//! service-key expansion before merge.

use indexmap::IndexSet;
use serde_yaml_ng::{Mapping, Value};
use swarmbender_client::entities::union::ListOrMap;

/// Keys whose value is a `ListOrMap` union and must be merged key-wise
/// in map form rather than wholesale-replaced when both sides are
/// sequences (spec.md §4.2 "special per-field semantics").
const LIST_OR_MAP_KEYS: &[&str] = &["environment", "labels"];

/// Expands a literal `"*"` service key in `overlay.services` to a copy
/// of that entry for every service name already present in
/// `known_service_names`, then discards the `"*"` entry. No-op if
/// overlay has no `services` mapping or no `"*"` key.
pub fn expand_wildcard_services(overlay: &mut Value, known_service_names: &[String]) {
  let Value::Mapping(root) = overlay else { return };
  let Some(Value::Mapping(services)) = root.get_mut("services") else {
    return;
  };
  let Some(wildcard_entry) = services.shift_remove("*") else {
    return;
  };
  for name in known_service_names {
    let key = Value::String(name.clone());
    match services.get_mut(&key) {
      Some(existing) => {
        let merged = merge_values(existing.clone(), wildcard_entry.clone(), None);
        *existing = merged;
      }
      None => {
        services.insert(key, wildcard_entry.clone());
      }
    }
  }
}

/// Recursively merges `overlay` into `base`. `key_hint` is the mapping
/// key this pair was reached under, used to special-case
/// `environment`/`labels`.
pub fn merge_values(base: Value, overlay: Value, key_hint: Option<&str>) -> Value {
  if let Some(key) = key_hint {
    if LIST_OR_MAP_KEYS.contains(&key) && is_list_or_map_shape(&base) && is_list_or_map_shape(&overlay) {
      return merge_list_or_map(base, overlay);
    }
  }
  match (base, overlay) {
    (Value::Mapping(base_map), Value::Mapping(overlay_map)) => Value::Mapping(merge_mappings(base_map, overlay_map)),
    (_, overlay) => overlay,
  }
}

fn is_list_or_map_shape(value: &Value) -> bool {
  matches!(value, Value::Sequence(_) | Value::Mapping(_) | Value::Null)
}

fn merge_mappings(base: Mapping, overlay: Mapping) -> Mapping {
  let mut result = base;
  for (key, overlay_value) in overlay {
    let key_hint = key.as_str();
    match result.get(&key).cloned() {
      Some(base_value) => {
        let merged = merge_values(base_value, overlay_value, key_hint);
        result.insert(key, merged);
      }
      None => {
        result.insert(key, overlay_value);
      }
    }
  }
  result
}

fn merge_list_or_map(base: Value, overlay: Value) -> Value {
  let base_list_or_map = ListOrMap::decode("merge", &base).unwrap_or(ListOrMap::Map(Default::default()));
  let overlay_list_or_map = ListOrMap::decode("merge", &overlay).unwrap_or(ListOrMap::Map(Default::default()));
  let mut merged_map = base_list_or_map.to_map();
  for (k, v) in overlay_list_or_map.to_map() {
    merged_map.insert(k, v);
  }
  // Prefer the overlay's variant (it is what the operator most recently
  // wrote); fall back to the base's variant when overlay was empty/null.
  let template = if matches!(overlay, Value::Null) { &base_list_or_map } else { &overlay_list_or_map };
  template.from_map_like(merged_map).encode()
}

/// `merge(merge(a,b),c) == merge(a,merge(b,c))` holds when `b` and `c`
/// touch disjoint key paths; ordering of overlay application is still
/// meaningful whenever they collide, which is why the orchestrator
/// applies overlays in a fixed declared order rather than relying on
/// associativity for correctness.
pub fn merge_in_order(base: Value, overlays: impl IntoIterator<Item = Value>) -> Value {
  overlays.into_iter().fold(base, |acc, overlay| merge_values(acc, overlay, None))
}

/// Collects the service names currently present in a compose document's
/// `services` mapping, in document order, for wildcard expansion.
pub fn known_service_names(working: &Value) -> Vec<String> {
  let mut names = IndexSet::new();
  if let Value::Mapping(root) = working {
    if let Some(Value::Mapping(services)) = root.get("services") {
      for key in services.keys() {
        if let Some(name) = key.as_str() {
          names.insert(name.to_string());
        }
      }
    }
  }
  names.into_iter().collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn yaml(s: &str) -> Value {
    serde_yaml_ng::from_str(s).unwrap()
  }

  #[test]
  fn mapping_recursion_keeps_base_only_keys() {
    let base = yaml("a: 1\nb: 2\n");
    let overlay = yaml("b: 20\nc: 3\n");
    let merged = merge_values(base, overlay, None);
    assert_eq!(merged, yaml("a: 1\nb: 20\nc: 3\n"));
  }

  #[test]
  fn sequence_collision_replaces_wholesale() {
    let base = yaml("ports:\n  - \"80:80\"\n  - \"443:443\"\n");
    let overlay = yaml("ports:\n  - \"8080:80\"\n");
    let merged = merge_values(base, overlay, None);
    assert_eq!(merged, yaml("ports:\n  - \"8080:80\"\n"));
  }

  #[test]
  fn environment_list_and_map_merge_key_wise() {
    let base = yaml("environment:\n  - FOO=1\n  - BAR=2\n");
    let overlay = yaml("environment:\n  BAR: 20\n  BAZ: 3\n");
    let merged = merge_values(base, overlay, Some("environment"));
    let Value::Mapping(m) = &merged else { panic!("expected mapping") };
    assert_eq!(m.get("FOO").and_then(Value::as_str), Some("1"));
    assert_eq!(m.get("BAR").and_then(Value::as_str), Some("20"));
    assert_eq!(m.get("BAZ").and_then(Value::as_str), Some("3"));
  }

  #[test]
  fn wildcard_service_expands_to_every_known_service() {
    let mut overlay = yaml("services:\n  \"*\":\n    logging:\n      driver: json-file\n");
    expand_wildcard_services(&mut overlay, &["api".to_string(), "worker".to_string()]);
    let Value::Mapping(root) = &overlay else { panic!() };
    let Some(Value::Mapping(services)) = root.get("services") else { panic!() };
    assert!(services.get("api").is_some());
    assert!(services.get("worker").is_some());
    assert!(services.get("*").is_none());
  }
}
