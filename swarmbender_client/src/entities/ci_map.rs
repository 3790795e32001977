//! Case-insensitive map keyed by environment-variable-style names.
//!
//! REDESIGN FLAG (spec.md §9): environment/label aggregation used to be
//! backed by a plain `HashMap<String, String>` with ad hoc
//! `.to_uppercase()` calls scattered at comparison sites. Centralizing
//! the case-folding in the map type itself means a lookup, an insert,
//! and a "does this key already exist" check can never disagree on
//! what case-insensitive means.

use std::borrow::Borrow;

use indexmap::IndexMap;

/// Preserves the original casing of the *first* key inserted under a
/// given fold, but all lookups/overwrites are case-insensitive. Iteration
/// order follows insertion order, matching the "last-wins, stable order"
/// rule used throughout the environment/label resolution pipeline.
#[derive(Debug, Clone, Default)]
pub struct CaseInsensitiveMap<V> {
  entries: IndexMap<String, (String, V)>,
}

fn fold(key: &str) -> String {
  key.to_ascii_uppercase()
}

impl<V> CaseInsensitiveMap<V> {
  pub fn new() -> Self {
    Self { entries: IndexMap::new() }
  }

  /// Inserts or overwrites a value. The original casing of `key` is kept
  /// only if this is the first insertion under that fold; later
  /// overwrites update the value but not the remembered casing.
  pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
    let key = key.into();
    let folded = fold(&key);
    match self.entries.get_mut(&folded) {
      Some((_, existing)) => Some(std::mem::replace(existing, value)),
      None => {
        self.entries.insert(folded, (key, value));
        None
      }
    }
  }

  pub fn get<Q>(&self, key: &Q) -> Option<&V>
  where
    String: Borrow<Q>,
    Q: AsRef<str> + ?Sized,
  {
    self.entries.get(&fold(key.as_ref())).map(|(_, v)| v)
  }

  pub fn contains_key(&self, key: &str) -> bool {
    self.entries.contains_key(&fold(key))
  }

  pub fn remove(&mut self, key: &str) -> Option<V> {
    self.entries.shift_remove(&fold(key)).map(|(_, v)| v)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Iterates in insertion order, yielding the originally-cased key.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
    self.entries.values().map(|(k, v)| (k.as_str(), v))
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.entries.values().map(|(k, _)| k.as_str())
  }
}

impl<V> FromIterator<(String, V)> for CaseInsensitiveMap<V> {
  fn from_iter<T: IntoIterator<Item = (String, V)>>(iter: T) -> Self {
    let mut map = Self::new();
    for (k, v) in iter {
      map.insert(k, v);
    }
    map
  }
}

impl<V> IntoIterator for CaseInsensitiveMap<V> {
  type Item = (String, V);
  type IntoIter = std::vec::IntoIter<(String, V)>;

  fn into_iter(self) -> Self::IntoIter {
    self.entries.into_values().collect::<Vec<_>>().into_iter()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn later_insert_overwrites_but_keeps_first_casing() {
    let mut map = CaseInsensitiveMap::new();
    map.insert("Foo_Bar", 1);
    map.insert("FOO_BAR", 2);
    assert_eq!(map.get("foo_bar"), Some(&2));
    let keys: Vec<&str> = map.keys().collect();
    assert_eq!(keys, vec!["Foo_Bar"]);
  }

  #[test]
  fn iteration_order_is_insertion_order() {
    let mut map = CaseInsensitiveMap::new();
    map.insert("b", 1);
    map.insert("a", 2);
    map.insert("b", 3);
    let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["b", "a"]);
  }
}
