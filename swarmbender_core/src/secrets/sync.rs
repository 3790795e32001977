//! The composed secrets-sync entrypoint (spec.md §2 "Secrets path
//! (sync)"): Policy Loader (supplied by the caller, same as
//! `SbConfig`/`SecretsPolicy` are for [`crate::orchestrator::render`]) →
//! Providers Hub → Filter → Versioner → Name Synthesizer → Engine
//! Adapter `ensure-created` → Map Writer. Mirrors `orchestrator::render`
//! in shape: a single function wiring the pieces in `secrets::*`
//! together rather than leaving callers to compose them by hand.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use swarmbender_client::entities::secrets_map::SecretsMap;
use swarmbender_client::entities::SecretsPolicy;
use swarmbender_client::error::SbError;

use super::hub::{KeyPipeline, ProviderHub, ReplaceRule};
use super::lifecycle::{build_labels, ensure_created_batch, EnsureCreatedReport};
use super::map_writer::{read_secrets_map, write_secrets_map};
use super::naming::{synthesize_name, Scope};
use super::versioning::{suffix, VersioningInput};
use crate::engine::EngineAdapter;

/// The inputs a sync needs beyond the already-loaded `SecretsPolicy`
/// (spec.md §3 "Scope"): where the secrets map and file-provider tree
/// live, which `(stackId, service)` scope to synthesize names under,
/// and the target environment.
pub struct SyncRequest<'a> {
  pub root: &'a Path,
  pub scope: Scope<'a>,
  pub env: &'a str,
}

/// The artifact produced by a completed sync (spec.md §2), the secrets
/// analogue of [`crate::orchestrator::RenderOutcome`].
#[derive(Debug, Clone)]
pub struct SyncOutcome {
  pub map_path: PathBuf,
  pub ensure_created: EnsureCreatedReport,
  pub synced_keys: Vec<String>,
}

fn key_pipeline(policy: &SecretsPolicy) -> KeyPipeline {
  KeyPipeline {
    includes: policy.secretize.paths.clone(),
    rename: policy.secretize.rename.clone(),
    replace: policy
      .secretize
      .replace
      .iter()
      .map(|rule| ReplaceRule {
        from: rule.from.clone(),
        to: rule.to.clone(),
      })
      .collect(),
    key_template: policy.secretize.key_template.clone(),
  }
}

/// Runs one full secrets sync for `request.scope` in `request.env`:
/// aggregates provider candidates, filters/renames/templates them,
/// computes each one's version suffix and engine-safe name, ensures
/// every name exists on the engine, and persists the updated secrets
/// map (spec.md §2, §4.5, §4.6). A no-op (empty outcome, map
/// untouched) when `policy.secretize.enabled` is `false`.
pub async fn sync<E: EngineAdapter>(request: SyncRequest<'_>, policy: &SecretsPolicy, hub: &ProviderHub, engine: &E) -> Result<SyncOutcome, SbError> {
  let map_path = request.root.join("ops").join("vars").join(format!("secrets-map.{}.yml", request.env));

  if !policy.secretize.enabled {
    tracing::info!(env = request.env, "secrets sync skipped, secretize disabled");
    return Ok(SyncOutcome {
      map_path,
      ensure_created: EnsureCreatedReport::default(),
      synced_keys: Vec::new(),
    });
  }

  tracing::info!(env = request.env, "secrets sync starting");
  let scope = request.scope.template_value();
  let pipeline = key_pipeline(policy);
  let candidates = hub.aggregate_and_pipeline(request.root, &scope, request.env, &pipeline).await?;

  let mut map = read_secrets_map(&map_path)?;
  let labels = build_labels(&scope, request.env, &policy.secretize.labels);

  let mut entries: Vec<(String, String, IndexMap<String, String>)> = Vec::with_capacity(candidates.len());
  let mut key_names: Vec<(String, String)> = Vec::with_capacity(candidates.len());
  for (key, value) in &candidates {
    let existing_external_name = map.get(key);
    let version = suffix(VersioningInput {
      mode: policy.secretize.version_mode,
      value,
      kv_version: None,
      hmac_salt: None,
      scope: &scope,
      env: request.env,
      key,
      existing_external_name,
    });
    let name = synthesize_name(&policy.secretize.name_template, &request.scope, request.env, key, &version);
    entries.push((name.clone(), value.clone(), labels.clone()));
    key_names.push((key.clone(), name));
  }

  let ensure_created = ensure_created_batch(engine, &entries).await?;

  for (key, name) in &key_names {
    map.insert(key.clone(), name.clone());
  }
  write_secrets_map(&map_path, &map)?;

  tracing::info!(
    env = request.env,
    synced = key_names.len(),
    created = ensure_created.created.len(),
    skipped = ensure_created.skipped.len(),
    failed = ensure_created.failed.len(),
    "secrets sync complete"
  );

  Ok(SyncOutcome {
    map_path,
    ensure_created,
    synced_keys: key_names.into_iter().map(|(key, _)| key).collect(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::engine::fake::FakeEngine;
  use crate::secrets::provider::EnvProvider;

  #[tokio::test]
  async fn sync_is_a_no_op_when_secretize_is_disabled() {
    let tmp = tempfile::tempdir().unwrap();
    let hub = ProviderHub::new(vec![Box::new(EnvProvider)]);
    let engine = FakeEngine::new();
    let policy = SecretsPolicy::with_defaults();
    assert!(!policy.secretize.enabled);

    let outcome = sync(
      SyncRequest {
        root: tmp.path(),
        scope: Scope::Literal("demo_api"),
        env: "dev",
      },
      &policy,
      &hub,
      &engine,
    )
    .await
    .unwrap();

    assert!(outcome.synced_keys.is_empty());
    assert!(!tmp.path().join("ops/vars/secrets-map.dev.yml").exists());
  }

  #[tokio::test]
  async fn sync_creates_secrets_and_persists_the_map() {
    let tmp = tempfile::tempdir().unwrap();
    let scope_dir = tmp.path().join("secrets/files/demo_api/dev");
    std::fs::create_dir_all(&scope_dir).unwrap();
    std::fs::write(scope_dir.join("ConnStr.secret"), "super-secret").unwrap();

    let hub = ProviderHub::new(vec![Box::new(super::super::provider::FileProvider)]);
    let engine = FakeEngine::new();
    let mut policy = SecretsPolicy::with_defaults();
    policy.secretize.enabled = true;

    let outcome = sync(
      SyncRequest {
        root: tmp.path(),
        scope: Scope::Literal("demo_api"),
        env: "dev",
      },
      &policy,
      &hub,
      &engine,
    )
    .await
    .unwrap();

    assert_eq!(outcome.synced_keys, vec!["ConnStr".to_string()]);
    assert_eq!(outcome.ensure_created.created.len(), 1);

    let map = read_secrets_map(&outcome.map_path).unwrap();
    let external_name = map.get("ConnStr").unwrap();
    assert_eq!(engine.value_of(external_name), Some("super-secret".to_string()));

    // A second sync with the same value must not re-upload (idempotent
    // ensure-created, spec.md §4.6).
    let second = sync(
      SyncRequest {
        root: tmp.path(),
        scope: Scope::Literal("demo_api"),
        env: "dev",
      },
      &policy,
      &hub,
      &engine,
    )
    .await
    .unwrap();
    assert_eq!(second.ensure_created.created.len(), 0);
    assert_eq!(second.ensure_created.skipped.len(), 1);
  }
}
