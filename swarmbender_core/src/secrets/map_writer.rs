//! Persists `ops/vars/secrets-map.<env>.yml` (spec.md §4.6, §5): written
//! sorted, via a temp-file-then-rename so a reader never observes a
//! partially-written map.

use std::path::Path;

use swarmbender_client::entities::secrets_map::SecretsMap;
use swarmbender_client::error::{ConfigError, SbError};

/// Reads the secrets map at `path`, or an empty map if it does not
/// exist yet (e.g. the first sync for an environment).
pub fn read_secrets_map(path: &Path) -> Result<SecretsMap, SbError> {
  if !path.is_file() {
    return Ok(SecretsMap::new());
  }
  let text = std::fs::read_to_string(path).map_err(|source| {
    SbError::Config(ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })
  })?;
  serde_yaml_ng::from_str(&text).map_err(|source| {
    SbError::Config(ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  })
}

/// Writes `map` (sorted, spec.md §5) to `path`, creating parent
/// directories as needed.
pub fn write_secrets_map(path: &Path, map: &SecretsMap) -> Result<(), SbError> {
  let sorted = map.sorted();
  let text = serde_yaml_ng::to_string(&sorted).map_err(|e| SbError::MapWrite(e.to_string()))?;

  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).map_err(|e| SbError::MapWrite(format!("creating {}: {e}", parent.display())))?;
  }

  let tmp_path = path.with_extension(format!(
    "{}.tmp",
    path.extension().and_then(|e| e.to_str()).unwrap_or("yml")
  ));
  std::fs::write(&tmp_path, &text).map_err(|e| SbError::MapWrite(format!("writing {}: {e}", tmp_path.display())))?;
  std::fs::rename(&tmp_path, path).map_err(|e| SbError::MapWrite(format!("renaming {} to {}: {e}", tmp_path.display(), path.display())))?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn writes_sorted_map_and_is_readable_back() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("ops/vars/secrets-map.dev.yml");

    let mut map = SecretsMap::new();
    map.insert("beta", "sb_beta_v1");
    map.insert("Alpha", "sb_alpha_v1");

    write_secrets_map(&path, &map).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let read_back: SecretsMap = serde_yaml_ng::from_str(&text).unwrap();
    let keys: Vec<&str> = read_back.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["Alpha", "beta"]);
    assert!(!path.with_extension("yml.tmp").exists());
  }

  #[test]
  fn read_secrets_map_returns_empty_for_missing_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("ops/vars/secrets-map.dev.yml");
    let map = read_secrets_map(&path).unwrap();
    assert!(map.is_empty());
  }

  #[test]
  fn read_secrets_map_round_trips_a_written_map() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("ops/vars/secrets-map.dev.yml");

    let mut map = SecretsMap::new();
    map.insert("Conn", "sb_conn_v1");
    write_secrets_map(&path, &map).unwrap();

    let read_back = read_secrets_map(&path).unwrap();
    assert_eq!(read_back.get("conn"), Some("sb_conn_v1"));
  }
}
