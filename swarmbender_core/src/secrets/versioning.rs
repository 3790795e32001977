//! Version-suffix computation (spec.md §3, §4.6): `content-sha`,
//! `kv-version`, `hmac`, `serial`, each with the documented fallback.

use swarmbender_client::entities::policy::VersionMode;

use crate::util::hash::{content_sha16, hmac_sha256_16};

pub struct VersioningInput<'a> {
  pub mode: VersionMode,
  pub value: &'a str,
  pub kv_version: Option<&'a str>,
  pub hmac_salt: Option<&'a str>,
  pub scope: &'a str,
  pub env: &'a str,
  pub key: &'a str,
  /// The secrets map's current external name for this key, if any
  /// (spec.md §4.6: serial mode keeps "a monotonic per-key counter kept
  /// in the map" — the counter lives in the persisted map itself rather
  /// than a process-local structure that would reset every call).
  pub existing_external_name: Option<&'a str>,
}

/// Extracts the trailing `_<n>` segment of a previously-synthesized
/// `serial`-mode name and returns `n + 1`; `1` if there is no existing
/// name or its trailing segment is not a plain non-negative integer.
fn next_serial(existing_external_name: Option<&str>) -> u64 {
  existing_external_name
    .and_then(|name| name.rsplit('_').next())
    .and_then(|segment| segment.parse::<u64>().ok())
    .map_or(1, |n| n + 1)
}

/// Computes the version suffix for a secret value, applying the
/// documented fallback to `content-sha` when a mode's prerequisite is
/// absent.
pub fn suffix(input: VersioningInput) -> String {
  match input.mode {
    VersionMode::ContentSha => content_sha16(input.value),
    VersionMode::KvVersion => input.kv_version.map(str::to_string).unwrap_or_else(|| content_sha16(input.value)),
    VersionMode::Hmac => match input.hmac_salt {
      Some(salt) => hmac_sha256_16(salt, input.value).unwrap_or_else(|_| content_sha16(input.value)),
      None => content_sha16(input.value),
    },
    VersionMode::Serial => next_serial(input.existing_external_name).to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn input<'a>(mode: VersionMode, value: &'a str) -> VersioningInput<'a> {
    VersioningInput {
      mode,
      value,
      kv_version: None,
      hmac_salt: None,
      scope: "demo_api",
      env: "dev",
      key: "ConnStr",
      existing_external_name: None,
    }
  }

  #[test]
  fn content_sha_is_16_hex_chars() {
    let s = suffix(input(VersionMode::ContentSha, "secret-value"));
    assert_eq!(s.len(), 16);
  }

  #[test]
  fn kv_version_falls_back_to_content_sha_when_absent() {
    let mut i = input(VersionMode::KvVersion, "secret-value");
    i.kv_version = None;
    let s = suffix(i);
    assert_eq!(s, content_sha16("secret-value"));
  }

  #[test]
  fn kv_version_uses_provider_version_when_present() {
    let mut i = input(VersionMode::KvVersion, "secret-value");
    i.kv_version = Some("v7");
    let s = suffix(i);
    assert_eq!(s, "v7");
  }

  #[test]
  fn hmac_falls_back_without_salt() {
    let i = input(VersionMode::Hmac, "secret-value");
    let s = suffix(i);
    assert_eq!(s, content_sha16("secret-value"));
  }

  #[test]
  fn serial_starts_at_one_with_no_existing_name() {
    let s = suffix(input(VersionMode::Serial, "a"));
    assert_eq!(s, "1");
  }

  #[test]
  fn serial_advances_from_the_version_encoded_in_the_existing_name() {
    let mut i = input(VersionMode::Serial, "b");
    i.existing_external_name = Some("sb_demo_api_dev_ConnStr_4");
    let s = suffix(i);
    assert_eq!(s, "5");
  }

  #[test]
  fn serial_restarts_at_one_when_existing_name_has_no_numeric_suffix() {
    let mut i = input(VersionMode::Serial, "c");
    i.existing_external_name = Some("sb_demo_api_dev_ConnStr_abcdef0123456789");
    let s = suffix(i);
    assert_eq!(s, "1");
  }
}
