//! `SecretsPolicy` (spec.md §6), loaded from `ops/policies/secrets.yml`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionMode {
  ContentSha,
  KvVersion,
  Hmac,
  Serial,
}

impl Default for VersionMode {
  fn default() -> Self {
    Self::ContentSha
  }
}

fn default_name_template() -> String {
  "sb_{scope}_{env}_{key}_{version}".to_string()
}

fn default_target_dir() -> String {
  "/run/secrets".to_string()
}

fn default_mode() -> u32 {
  0o444
}

/// One ordered substring substitution applied to a flat key (spec.md
/// §4.5 "Replace rules"), forward direction on upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceRuleConfig {
  pub from: String,
  pub to: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Secretize {
  #[serde(default)]
  pub enabled: bool,
  #[serde(default)]
  pub paths: Vec<String>,
  #[serde(default = "default_name_template")]
  pub name_template: String,
  #[serde(default)]
  pub version_mode: VersionMode,
  #[serde(default = "default_target_dir")]
  pub target_dir: String,
  #[serde(default = "default_mode")]
  pub mode: u32,
  #[serde(default)]
  pub labels: IndexMap<String, String>,
  /// Explicit `flatKey -> externalKey` overrides, applied before
  /// `replace`/`key_template` (spec.md §4.5 "Rename map").
  #[serde(default)]
  pub rename: IndexMap<String, String>,
  #[serde(default)]
  pub replace: Vec<ReplaceRuleConfig>,
  #[serde(default)]
  pub key_template: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretsPolicy {
  #[serde(default)]
  pub secretize: Secretize,
}

impl SecretsPolicy {
  pub fn with_defaults() -> Self {
    Self {
      secretize: Secretize {
        enabled: false,
        paths: Vec::new(),
        name_template: default_name_template(),
        version_mode: VersionMode::default(),
        target_dir: default_target_dir(),
        mode: default_mode(),
        labels: IndexMap::new(),
        rename: IndexMap::new(),
        replace: Vec::new(),
        key_template: None,
      },
    }
  }
}
