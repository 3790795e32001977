//! In-memory `EngineAdapter` enforcing the same idempotent
//! "already-exists is success" contract as the CLI adapter, used by the
//! lifecycle-engine test suite (spec.md §9: "test suite runs against an
//! in-memory fake that enforces the contract").

use std::collections::HashSet;
use std::sync::Mutex;

use indexmap::IndexMap;
use swarmbender_client::error::SbError;

use super::{DetailedSecret, EngineAdapter};

struct StoredSecret {
  value: String,
  labels: IndexMap<String, String>,
  created_at: String,
}

#[derive(Default)]
pub struct FakeEngine {
  secrets: Mutex<IndexMap<String, StoredSecret>>,
  clock: Mutex<u64>,
}

impl FakeEngine {
  pub fn new() -> Self {
    Self::default()
  }

  fn next_timestamp(&self) -> String {
    let mut clock = self.clock.lock().unwrap();
    *clock += 1;
    format!("1970-01-01T00:00:{:02}Z", *clock)
  }

  pub fn seed(&self, name: impl Into<String>, value: impl Into<String>, labels: IndexMap<String, String>) {
    let created_at = self.next_timestamp();
    self.secrets.lock().unwrap().insert(
      name.into(),
      StoredSecret {
        value: value.into(),
        labels,
        created_at,
      },
    );
  }

  pub fn value_of(&self, name: &str) -> Option<String> {
    self.secrets.lock().unwrap().get(name).map(|s| s.value.clone())
  }
}

impl EngineAdapter for FakeEngine {
  async fn list_names(&self) -> Result<HashSet<String>, SbError> {
    Ok(self.secrets.lock().unwrap().keys().cloned().collect())
  }

  async fn list_detailed(&self) -> Result<Vec<DetailedSecret>, SbError> {
    Ok(
      self
        .secrets
        .lock()
        .unwrap()
        .iter()
        .map(|(name, stored)| DetailedSecret {
          name: name.clone(),
          created_at: stored.created_at.clone(),
          labels: stored.labels.clone(),
        })
        .collect(),
    )
  }

  async fn ensure_created(&self, name: &str, value: &str, labels: &IndexMap<String, String>) -> Result<bool, SbError> {
    let mut secrets = self.secrets.lock().unwrap();
    if secrets.contains_key(name) {
      return Ok(false);
    }
    let created_at = self.next_timestamp();
    secrets.insert(
      name.to_string(),
      StoredSecret {
        value: value.to_string(),
        labels: labels.clone(),
        created_at,
      },
    );
    Ok(true)
  }

  async fn remove(&self, name: &str) -> Result<bool, SbError> {
    Ok(self.secrets.lock().unwrap().shift_remove(name).is_some())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn ensure_created_is_idempotent_and_does_not_reupload() {
    let engine = FakeEngine::new();
    let labels = IndexMap::new();
    assert!(engine.ensure_created("sb_demo_v1", "value-a", &labels).await.unwrap());
    assert!(!engine.ensure_created("sb_demo_v1", "value-b", &labels).await.unwrap());
    assert_eq!(engine.value_of("sb_demo_v1"), Some("value-a".to_string()));
  }

  #[tokio::test]
  async fn remove_reports_whether_it_existed() {
    let engine = FakeEngine::new();
    let labels = IndexMap::new();
    engine.ensure_created("sb_demo_v1", "value-a", &labels).await.unwrap();
    assert!(engine.remove("sb_demo_v1").await.unwrap());
    assert!(!engine.remove("sb_demo_v1").await.unwrap());
  }
}
