//! `RenderContext` (spec.md §3): the mutable state threaded through the
//! render pipeline's stages. Stages may only write the fields the stage
//! table names for them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use swarmbender_client::entities::{CaseInsensitiveMap, ComposeFile, RenderRequest, SbConfig, SecretsMap, SecretsPolicy};

/// A per-call cancellation flag, checked between stages (spec.md §5).
/// Cheap to clone; all clones observe the same underlying flag.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

/// Flattened app-settings contributions merged in at the overlay step
/// (spec.md §4.3), kept separate from `Working.services.*.environment`
/// because they originate from `appsettings*.json`, not from a typed
/// compose overlay document. `"*"` under `scope` holds global
/// (`stacks/all/<env>/env/*.json`) contributions applied to every
/// service; a service name holds that service's own contributions.
pub const GLOBAL_SCOPE: &str = "*";

#[derive(Debug, Default)]
pub struct SecretsBag {
  /// The persisted `flatKey -> externalName` map for this environment,
  /// read-only for the render pipeline (spec.md §3 `SecretsMap`).
  pub map: SecretsMap,
}

pub struct RenderContext {
  pub request: RenderRequest,
  pub config: SbConfig,
  pub secrets_policy: SecretsPolicy,
  /// Created once per render, never mutated after [`super::stages::load_template`].
  pub template: ComposeFile,
  /// Cloned from `template` at stage 100, mutated in place by later stages.
  pub working: ComposeFile,
  pub aggregated_environment: IndexMap<String, CaseInsensitiveMap<String>>,
  pub aggregated_labels: IndexMap<String, CaseInsensitiveMap<String>>,
  pub secrets_bag: SecretsBag,
  /// Each service's final resolved environment, populated by
  /// `EnvironmentApply` (stage 300) and consumed by `TokenExpand` (600)
  /// for `${ENVVARS}` and `${NAME}` lookups.
  pub resolved_environment: IndexMap<String, IndexMap<String, String>>,
  /// `stacks/all/<env>/env/use-envvars.json` names present in the
  /// process environment, populated by `ApplyOverlays` (200) and reused
  /// by `EnvironmentApply` (300) and `TokenExpand` (600).
  pub process_env_allowlist: IndexMap<String, String>,
}

impl RenderContext {
  pub fn new(request: RenderRequest, config: SbConfig, secrets_policy: SecretsPolicy, template: ComposeFile) -> Self {
    Self {
      request,
      config,
      secrets_policy,
      working: template.clone(),
      template,
      aggregated_environment: IndexMap::new(),
      aggregated_labels: IndexMap::new(),
      secrets_bag: SecretsBag::default(),
      resolved_environment: IndexMap::new(),
      process_env_allowlist: IndexMap::new(),
    }
  }
}
