//! The Swarm Engine Adapter (spec.md §4.6): the four operations the
//! secrets lifecycle engine needs, implemented either by shelling out
//! to the `docker` CLI ([`cli::CliEngine`]) or by an in-memory fake used
//! in tests ([`fake::FakeEngine`]). Kept as a plain trait with a
//! generic-over-`E` call style rather than `dyn`-boxed, matching how
//! komodo's docker adapters are used concretely rather than behind a
//! trait object (spec.md §9: "keep both behind the Engine Adapter
//! trait; test suite runs against an in-memory fake that enforces the
//! contract").

pub mod cli;
pub mod fake;

use indexmap::IndexMap;
use swarmbender_client::error::SbError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailedSecret {
  pub name: String,
  pub created_at: String,
  pub labels: IndexMap<String, String>,
}

pub trait EngineAdapter {
  async fn list_names(&self) -> Result<std::collections::HashSet<String>, SbError>;

  async fn list_detailed(&self) -> Result<Vec<DetailedSecret>, SbError>;

  /// Returns `true` if a new secret was created, `false` if it already
  /// existed (engine's "already exists" response is success, not an
  /// error).
  async fn ensure_created(&self, name: &str, value: &str, labels: &IndexMap<String, String>) -> Result<bool, SbError>;

  /// Returns `true` if removed, `false` if it did not exist.
  async fn remove(&self, name: &str) -> Result<bool, SbError>;
}
