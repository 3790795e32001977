//! `SbConfig` (spec.md §6) and the immutable `RenderRequest` that seeds
//! a render. Grounded in komodo's `PeripheryConfig`
//! (`client/core/rs/src/entities/config/periphery.rs`): defaults live on
//! the struct via `#[serde(default = "fn")]`, and a plain struct is
//! passed by value rather than reached through a process-wide
//! singleton (spec.md §9 redesign note: "pass `SbConfig` by value
//! through `RenderContext`; no global state").

use std::collections::HashMap;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

fn default_overlay_order() -> Vec<String> {
  vec![
    "stacks/all/{env}/stack/*.y?(a)ml".to_string(),
    "stacks/{stackId}/{env}/stack/*.y?(a)ml".to_string(),
    "services/{svc}/{env}/*.y?(a)ml".to_string(),
  ]
}

fn default_out_dir() -> String {
  "ops/state/last".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppSettingsMode {
  Env,
  Config,
}

impl Default for AppSettingsMode {
  fn default() -> Self {
    Self::Env
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderSettings {
  #[serde(default)]
  pub appsettings_mode: AppSettingsMode,
  #[serde(default = "default_out_dir")]
  pub out_dir: String,
  #[serde(default)]
  pub write_history: bool,
  #[serde(default = "default_overlay_order")]
  pub overlay_order: Vec<String>,
}

impl RenderSettings {
  fn with_defaults() -> Self {
    Self {
      appsettings_mode: AppSettingsMode::default(),
      out_dir: default_out_dir(),
      write_history: false,
      overlay_order: default_overlay_order(),
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokensSettings {
  #[serde(default)]
  pub user: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataSettings {
  #[serde(default)]
  pub tenants: Option<Vec<String>>,
  #[serde(default)]
  pub groups: Option<IndexMap<String, Vec<String>>>,
}

/// Recognized keys from `ops/sb.yml`. Unknown top-level keys are
/// rejected by serde's default (non-`deny_unknown_fields`) behavior,
/// i.e. silently ignored, matching compose-adjacent tooling rather than
/// failing a render over an unrelated typo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SbConfig {
  #[serde(default)]
  pub render: RenderSettings,
  #[serde(default)]
  pub tokens: TokensSettings,
  #[serde(default)]
  pub metadata: MetadataSettings,
}

impl SbConfig {
  pub fn with_defaults() -> Self {
    Self {
      render: RenderSettings::with_defaults(),
      tokens: TokensSettings::default(),
      metadata: MetadataSettings::default(),
    }
  }
}

/// The immutable request that seeds a render (spec.md §3 `RenderContext`).
#[derive(Debug, Clone)]
pub struct RenderRequest {
  pub root_path: PathBuf,
  pub stack_id: String,
  pub env: String,
  pub app_settings_mode: AppSettingsMode,
  pub out_dir: PathBuf,
  pub write_history: bool,
}

impl RenderRequest {
  pub fn new(root_path: impl Into<PathBuf>, stack_id: impl Into<String>, env: impl Into<String>) -> Self {
    let root_path = root_path.into();
    Self {
      out_dir: root_path.join(default_out_dir()),
      root_path,
      stack_id: stack_id.into(),
      env: env.into(),
      app_settings_mode: AppSettingsMode::default(),
      write_history: false,
    }
  }

  pub fn stacks_dir(&self) -> PathBuf {
    self.root_path.join("stacks")
  }

  pub fn ops_dir(&self) -> PathBuf {
    self.root_path.join("ops")
  }

  pub fn services_dir(&self) -> PathBuf {
    self.root_path.join("services")
  }
}

/// Environment overlay over `SbConfig`, read via `envy` the way
/// komodo's `periphery_config()`/`core_config()` layer an `Env` struct
/// on top of the file-based config (see `bin/periphery/src/config.rs`).
/// Only the handful of values an operator would reasonably want to pin
/// per-host without editing `sb.yml` are exposed here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SbEnv {
  pub sb_root: Option<String>,
  pub sb_render_out_dir: Option<String>,
  pub sb_render_write_history: Option<bool>,
  #[serde(default)]
  pub sb_tokens: HashMap<String, String>,
}

impl SbEnv {
  pub fn apply_over(&self, mut config: SbConfig) -> SbConfig {
    if let Some(out_dir) = &self.sb_render_out_dir {
      config.render.out_dir = out_dir.clone();
    }
    if let Some(write_history) = self.sb_render_write_history {
      config.render.write_history = write_history;
    }
    for (k, v) in &self.sb_tokens {
      config.tokens.user.insert(k.clone(), v.clone());
    }
    config
  }
}
