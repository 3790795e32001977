//! Loads `SbConfig` and `SecretsPolicy` from the conventional
//! filesystem layout (spec.md §6) and layers the `SbEnv` process
//! environment overlay on top of `SbConfig`, mirroring komodo's
//! `ConfigLoader`/`core_config()` pattern (`bin/core/src/config.rs`)
//! but returning an owned value instead of reaching through a
//! process-wide `OnceLock` (spec.md §9: "pass `SbConfig` by value...
//! no global state").

use std::path::Path;

use swarmbender_client::entities::{SbConfig, SbEnv, SecretsPolicy};
use swarmbender_client::error::{ConfigError, SbError};

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, SbError> {
  // An absent file is equivalent to an empty document: every field of
  // `SbConfig`/`SecretsPolicy` carries a `#[serde(default = "...")]`,
  // so deserializing `{}` produces the same documented defaults as a
  // file that simply omits every key.
  let text = if path.is_file() {
    std::fs::read_to_string(path).map_err(|source| {
      SbError::Config(ConfigError::Read {
        path: path.to_path_buf(),
        source,
      })
    })?
  } else {
    "{}".to_string()
  };
  serde_yaml_ng::from_str(&text).map_err(|source| {
    SbError::Config(ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  })
}

/// Loads `<root>/ops/sb.yml`, applying the `SbEnv` process-environment
/// overlay (read via `envy`) on top. A missing file yields the
/// documented defaults.
pub fn load_sb_config(root: &Path) -> Result<SbConfig, SbError> {
  // Lets an operator's local `.env` populate `SB_*` variables before the
  // `envy` overlay reads them, the same ambient convenience komodo's
  // `bin/periphery/src/main.rs` gets from `dotenvy::dotenv().ok()` at
  // startup. A missing `.env` is not an error.
  dotenvy::dotenv().ok();
  let path = root.join("ops").join("sb.yml");
  let config: SbConfig = read_yaml(&path)?;
  let env_overlay: SbEnv = envy::prefixed("SB_").from_env().unwrap_or_default();
  Ok(env_overlay.apply_over(config))
}

/// Loads `<root>/ops/policies/secrets.yml`. A missing file yields the
/// documented defaults.
pub fn load_secrets_policy(root: &Path) -> Result<SecretsPolicy, SbError> {
  let path = root.join("ops").join("policies").join("secrets.yml");
  read_yaml(&path)
}
