//! The Secrets Lifecycle Engine (spec.md §4.6): idempotent
//! ensure-created, doctor, prune, rotate, each returning a structured
//! report (spec.md §7: "operations print a structured summary"; here
//! the summary is the return value — table rendering is out of scope
//! per spec.md §1, so the host CLI renders these, not this crate).

use std::collections::HashSet;

use futures_util::stream::FuturesOrdered;
use futures_util::StreamExt;
use indexmap::IndexMap;
use swarmbender_client::entities::secrets_map::SecretsMap;
use swarmbender_client::error::SbError;

use super::naming::Scope;
use super::versioning::{suffix, VersioningInput};
use crate::engine::{DetailedSecret, EngineAdapter};

pub const OWNER_LABEL: &str = "owner";
pub const OWNER_VALUE: &str = "swarmbender";
pub const SCOPE_LABEL: &str = "scope";
pub const ENV_LABEL: &str = "env";

pub const DEFAULT_KEEP: usize = 2;

/// Labels applied on create: `owner=swarmbender`, `scope`, `env`,
/// merged with policy-defined labels (policy wins on `owner` only if
/// explicitly set).
pub fn build_labels(scope: &str, env: &str, policy_labels: &IndexMap<String, String>) -> IndexMap<String, String> {
  let mut labels = IndexMap::new();
  labels.insert(OWNER_LABEL.to_string(), OWNER_VALUE.to_string());
  labels.insert(SCOPE_LABEL.to_string(), scope.to_string());
  labels.insert(ENV_LABEL.to_string(), env.to_string());
  for (k, v) in policy_labels {
    labels.insert(k.clone(), v.clone());
  }
  labels
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnsureCreatedReport {
  pub created: Vec<String>,
  pub skipped: Vec<String>,
  pub failed: Vec<(String, String)>,
}

/// Ensures every `(name, value, labels)` triple exists on the engine,
/// never re-uploading a name already present (spec.md §4.6: names are
/// content-addressed, so equal name implies equal value).
///
/// Dispatches the batch concurrently via a `FuturesOrdered`, the same
/// shape komodo's `docker/stack.rs` uses to fan out independent engine
/// calls while keeping results lined up with their inputs.
pub async fn ensure_created_batch<E: EngineAdapter>(
  engine: &E,
  entries: &[(String, String, IndexMap<String, String>)],
) -> Result<EnsureCreatedReport, SbError> {
  let mut report = EnsureCreatedReport::default();
  let outcomes: Vec<(String, Result<bool, SbError>)> = entries
    .iter()
    .map(|(name, value, labels)| async move { (name.clone(), engine.ensure_created(name, value, labels).await) })
    .collect::<FuturesOrdered<_>>()
    .collect()
    .await;
  for (name, outcome) in outcomes {
    match outcome {
      Ok(true) => {
        tracing::info!(secret = %name, "created");
        report.created.push(name);
      }
      Ok(false) => {
        tracing::debug!(secret = %name, "already present, skipped");
        report.skipped.push(name);
      }
      Err(e) => {
        tracing::warn!(secret = %name, error = %e, "create failed");
        report.failed.push((name, e.to_string()));
      }
    }
  }
  tracing::info!(created = report.created.len(), skipped = report.skipped.len(), failed = report.failed.len(), "ensure-created batch complete");
  Ok(report)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiVersionGroup {
  pub stripped_key: String,
  pub names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoctorReport {
  pub missing_on_engine: Vec<String>,
  pub orphaned_on_engine: Vec<String>,
  pub multi_versions: Vec<MultiVersionGroup>,
}

/// Strips the final `_<version>` segment from a synthesized secret
/// name, used to group versions of "the same logical secret" for
/// doctor/prune.
pub fn strip_version_suffix(name: &str) -> &str {
  match name.rfind('_') {
    Some(idx) => &name[..idx],
    None => name,
  }
}

pub async fn doctor<E: EngineAdapter>(engine: &E, map: &SecretsMap, env: &str) -> Result<DoctorReport, SbError> {
  let names = engine.list_names().await?;
  let detailed = engine.list_detailed().await?;

  let missing_on_engine = map
    .iter()
    .map(|(_, name)| name.to_string())
    .filter(|name| !names.contains(name))
    .collect();

  let map_names: HashSet<&str> = map.iter().map(|(_, name)| name).collect();
  let owned: Vec<&DetailedSecret> = detailed
    .iter()
    .filter(|s| s.labels.get(OWNER_LABEL).map(String::as_str) == Some(OWNER_VALUE))
    .collect();
  let orphaned_on_engine = owned
    .iter()
    .filter(|s| !map_names.contains(s.name.as_str()))
    .map(|s| s.name.clone())
    .collect();

  let mut groups: IndexMap<String, Vec<String>> = IndexMap::new();
  for secret in &owned {
    if secret.labels.get(ENV_LABEL).map(String::as_str) != Some(env) {
      continue;
    }
    groups.entry(strip_version_suffix(&secret.name).to_string()).or_default().push(secret.name.clone());
  }
  let multi_versions = groups
    .into_iter()
    .filter(|(_, names)| names.len() > 1)
    .map(|(stripped_key, names)| MultiVersionGroup { stripped_key, names })
    .collect();

  let report = DoctorReport {
    missing_on_engine,
    orphaned_on_engine,
    multi_versions,
  };
  tracing::info!(
    env,
    missing = report.missing_on_engine.len(),
    orphaned = report.orphaned_on_engine.len(),
    multi_version_groups = report.multi_versions.len(),
    "doctor complete"
  );
  Ok(report)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
  pub kept: Vec<String>,
  pub removed: Vec<String>,
  pub failed: Vec<(String, String)>,
}

/// Prunes engine secrets labeled `owner=swarmbender`, `env`, and
/// (optionally) `scope`, keeping the `keep` most-recently-created per
/// stripped key. `dry_run` reports without mutating the engine.
pub async fn prune<E: EngineAdapter>(
  engine: &E,
  env: &str,
  scope: Option<&str>,
  keep: usize,
  dry_run: bool,
) -> Result<PruneReport, SbError> {
  let detailed = engine.list_detailed().await?;
  let mut groups: IndexMap<String, Vec<&DetailedSecret>> = IndexMap::new();
  for secret in &detailed {
    if secret.labels.get(OWNER_LABEL).map(String::as_str) != Some(OWNER_VALUE) {
      continue;
    }
    if secret.labels.get(ENV_LABEL).map(String::as_str) != Some(env) {
      continue;
    }
    if let Some(scope) = scope {
      if secret.labels.get(SCOPE_LABEL).map(String::as_str) != Some(scope) {
        continue;
      }
    }
    groups.entry(strip_version_suffix(&secret.name).to_string()).or_default().push(secret);
  }

  let mut report = PruneReport::default();
  for (_, mut members) in groups {
    members.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let (keep_list, remove_list) = members.split_at(members.len().min(keep));
    report.kept.extend(keep_list.iter().map(|s| s.name.clone()));
    for secret in remove_list {
      if dry_run {
        report.removed.push(secret.name.clone());
        continue;
      }
      match engine.remove(&secret.name).await {
        Ok(_) => {
          tracing::info!(secret = %secret.name, "pruned");
          report.removed.push(secret.name.clone());
        }
        Err(e) => {
          tracing::warn!(secret = %secret.name, error = %e, "prune failed");
          report.failed.push((secret.name.clone(), e.to_string()));
        }
      }
    }
  }
  tracing::info!(env, dry_run, kept = report.kept.len(), removed = report.removed.len(), "prune complete");
  Ok(report)
}

/// One key to rotate, alongside its new plaintext value.
pub struct RotationInput<'a> {
  pub key: &'a str,
  pub new_value: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotateReport {
  pub rotated: Vec<(String, String)>,
  pub failed: Vec<(String, String)>,
  pub pruned: Vec<String>,
}

/// Rotates each input key to a new content-addressed name, updating the
/// secrets map only after every engine op in the batch succeeds (no
/// partial map commit on failure, spec.md §4.6).
#[allow(clippy::too_many_arguments)]
pub async fn rotate<E: EngineAdapter>(
  engine: &E,
  map: &mut SecretsMap,
  inputs: &[RotationInput<'_>],
  name_template: &str,
  scope: &Scope<'_>,
  env: &str,
  version_mode: swarmbender_client::entities::policy::VersionMode,
  labels: &IndexMap<String, String>,
  keep: Option<usize>,
) -> Result<RotateReport, SbError> {
  let mut pending_updates = Vec::new();
  let mut failed = Vec::new();

  for input in inputs {
    let existing_external_name = map.get(input.key);
    let version = suffix(VersioningInput {
      mode: version_mode,
      value: input.new_value,
      kv_version: None,
      hmac_salt: None,
      scope: "rotate",
      env,
      key: input.key,
      existing_external_name,
    });
    let name = super::naming::synthesize_name(name_template, scope, env, input.key, &version);
    match engine.ensure_created(&name, input.new_value, labels).await {
      Ok(_) => {
        tracing::info!(key = input.key, secret = %name, "rotated");
        pending_updates.push((input.key.to_string(), name));
      }
      Err(e) => {
        tracing::warn!(key = input.key, error = %e, "rotate failed");
        failed.push((input.key.to_string(), e.to_string()));
      }
    }
  }

  if !failed.is_empty() {
    // At least one engine op failed: leave the engine as-is and do not
    // touch the map (spec.md §4.6 atomicity boundary).
    tracing::warn!(env, failed = failed.len(), "rotate aborted, map left untouched");
    return Ok(RotateReport {
      rotated: Vec::new(),
      failed,
      pruned: Vec::new(),
    });
  }

  for (key, name) in &pending_updates {
    map.insert(key.clone(), name.clone());
  }

  let mut pruned = Vec::new();
  if let Some(keep) = keep {
    let scope_label = match scope {
      Scope::Literal(s) => Some(*s),
      _ => None,
    };
    let prune_report = prune(engine, env, scope_label, keep, false).await?;
    pruned.extend(prune_report.removed);
  }

  tracing::info!(env, rotated = pending_updates.len(), pruned = pruned.len(), "rotate complete");
  Ok(RotateReport {
    rotated: pending_updates,
    failed: Vec::new(),
    pruned,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::engine::fake::FakeEngine;

  fn labels(env: &str) -> IndexMap<String, String> {
    build_labels("demo_api", env, &IndexMap::new())
  }

  #[tokio::test]
  async fn doctor_reports_multi_version_group() {
    let engine = FakeEngine::new();
    engine.seed("sb_demo_api_dev_CONN_v1hex16", "a", labels("dev"));
    engine.seed("sb_demo_api_dev_CONN_v2hex16", "b", labels("dev"));
    let mut map = SecretsMap::new();
    map.insert("CONN", "sb_demo_api_dev_CONN_v1hex16");
    let report = doctor(&engine, &map, "dev").await.unwrap();
    assert_eq!(report.multi_versions.len(), 1);
    assert_eq!(report.multi_versions[0].names.len(), 2);
  }

  #[tokio::test]
  async fn doctor_reports_missing_and_orphaned() {
    let engine = FakeEngine::new();
    engine.seed("sb_demo_api_dev_OTHER_v1hex16", "x", labels("dev"));
    let mut map = SecretsMap::new();
    map.insert("CONN", "sb_demo_api_dev_CONN_v1hex16");
    let report = doctor(&engine, &map, "dev").await.unwrap();
    assert_eq!(report.missing_on_engine, vec!["sb_demo_api_dev_CONN_v1hex16".to_string()]);
    assert_eq!(report.orphaned_on_engine, vec!["sb_demo_api_dev_OTHER_v1hex16".to_string()]);
  }

  #[tokio::test]
  async fn prune_keeps_newest_n_per_stripped_key() {
    let engine = FakeEngine::new();
    for v in ["v1", "v2", "v3"] {
      engine.seed(format!("sb_demo_api_dev_CONN_{v}"), "x", labels("dev"));
    }
    let report = prune(&engine, "dev", None, 2, false).await.unwrap();
    assert_eq!(report.kept.len(), 2);
    assert_eq!(report.removed.len(), 1);
    assert_eq!(report.removed[0], "sb_demo_api_dev_CONN_v1");
  }

  #[tokio::test]
  async fn prune_dry_run_does_not_mutate_engine() {
    let engine = FakeEngine::new();
    for v in ["v1", "v2", "v3"] {
      engine.seed(format!("sb_demo_api_dev_CONN_{v}"), "x", labels("dev"));
    }
    prune(&engine, "dev", None, 2, true).await.unwrap();
    assert_eq!(engine.list_names().await.unwrap().len(), 3);
  }

  #[tokio::test]
  async fn rotate_in_serial_mode_advances_from_the_map_across_calls() {
    use swarmbender_client::entities::policy::VersionMode;

    let engine = FakeEngine::new();
    let scope = Scope::Literal("demo_api");
    let mut map = SecretsMap::new();

    rotate(
      &engine,
      &mut map,
      &[RotationInput { key: "Conn", new_value: "a" }],
      "sb_{scope}_{env}_{key}_{version}",
      &scope,
      "dev",
      VersionMode::Serial,
      &labels("dev"),
      None,
    )
    .await
    .unwrap();
    assert_eq!(map.get("Conn"), Some("sb_demo_api_dev_Conn_1"));

    // A second rotate() call for the same key must read the counter
    // back from the persisted map rather than starting over at 1.
    rotate(
      &engine,
      &mut map,
      &[RotationInput { key: "Conn", new_value: "b" }],
      "sb_{scope}_{env}_{key}_{version}",
      &scope,
      "dev",
      VersionMode::Serial,
      &labels("dev"),
      None,
    )
    .await
    .unwrap();
    assert_eq!(map.get("Conn"), Some("sb_demo_api_dev_Conn_2"));
  }
}
