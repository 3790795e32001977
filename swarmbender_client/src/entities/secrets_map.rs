//! The persisted `flatKey -> externalName` map (spec.md §3, §6). Keys
//! are sorted case-insensitively on every write, matching the stated
//! serialization invariant, and looked up case-insensitively like the
//! other two `RenderContext` bags (spec.md §3: "all with case-insensitive
//! keys"), backed by the same fold-but-preserve-casing scheme as
//! [`super::ci_map::CaseInsensitiveMap`].

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

fn fold(key: &str) -> String {
  key.to_ascii_uppercase()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretsMap {
  /// Keyed by the folded (upper-cased) flat key; the tuple keeps the
  /// originally-cased key for emission and lookup misses.
  entries: IndexMap<String, (String, String)>,
}

impl SecretsMap {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, flat_key: &str) -> Option<&str> {
    self.entries.get(&fold(flat_key)).map(|(_, v)| v.as_str())
  }

  /// Inserts or overwrites an entry. The original casing of `flat_key`
  /// is kept only on the first insert under a given fold, matching
  /// `CaseInsensitiveMap`.
  pub fn insert(&mut self, flat_key: impl Into<String>, external_name: impl Into<String>) {
    let flat_key = flat_key.into();
    let folded = fold(&flat_key);
    let external_name = external_name.into();
    match self.entries.get_mut(&folded) {
      Some((_, value)) => *value = external_name,
      None => {
        self.entries.insert(folded, (flat_key, external_name));
      }
    }
  }

  pub fn contains_key(&self, flat_key: &str) -> bool {
    self.entries.contains_key(&fold(flat_key))
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.entries.values().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Returns a copy with entries sorted case-insensitively ascending by
  /// key, the order the map must be written in (spec.md §5).
  pub fn sorted(&self) -> Self {
    let mut pairs: Vec<(String, String)> = self.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    pairs.sort_by(|(a, _), (b, _)| a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase()));
    let mut out = Self::new();
    for (k, v) in pairs {
      out.insert(k, v);
    }
    out
  }
}

impl Serialize for SecretsMap {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let plain: IndexMap<&str, &str> = self.iter().collect();
    plain.serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for SecretsMap {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let plain = IndexMap::<String, String>::deserialize(deserializer)?;
    let mut map = Self::new();
    for (k, v) in plain {
      map.insert(k, v);
    }
    Ok(map)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sorted_is_case_insensitive() {
    let mut map = SecretsMap::new();
    map.insert("beta", "sb_beta");
    map.insert("Alpha", "sb_alpha");
    map.insert("gamma", "sb_gamma");
    let sorted = map.sorted();
    let keys: Vec<&str> = sorted.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["Alpha", "beta", "gamma"]);
  }

  #[test]
  fn get_is_case_insensitive_and_keeps_first_casing() {
    let mut map = SecretsMap::new();
    map.insert("ConnectionStrings__Main", "sb_conn_v1");
    assert_eq!(map.get("connectionstrings__main"), Some("sb_conn_v1"));
    assert_eq!(map.get("CONNECTIONSTRINGS__MAIN"), Some("sb_conn_v1"));

    map.insert("connectionstrings__main", "sb_conn_v2");
    assert_eq!(map.get("ConnectionStrings__Main"), Some("sb_conn_v2"));
    let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["ConnectionStrings__Main"]);
  }
}
