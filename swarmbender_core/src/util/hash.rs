//! Content-hash helpers shared by secret versioning and name clamping.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

/// First 16 hex chars of SHA-256(value), the `content-sha` version mode.
pub fn content_sha16(value: &str) -> String {
  let digest = Sha256::digest(value.as_bytes());
  hex::encode(digest)[..16].to_string()
}

/// First 8 hex chars of SHA-256(value), used by the name-clamping
/// middle-hash and the name-synthesis fallback (spec.md §4.6).
pub fn sha8(value: &str) -> String {
  let digest = Sha256::digest(value.as_bytes());
  hex::encode(digest)[..8].to_string()
}

/// Salted HMAC-SHA256 of `value`, first 16 hex chars, the `hmac`
/// version mode.
pub fn hmac_sha256_16(salt: &str, value: &str) -> Result<String, String> {
  let mut mac = Hmac::<Sha256>::new_from_slice(salt.as_bytes()).map_err(|e| e.to_string())?;
  mac.update(value.as_bytes());
  let result = mac.finalize().into_bytes();
  Ok(hex::encode(result)[..16].to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn content_sha16_is_deterministic_and_16_chars() {
    let a = content_sha16("hello");
    let b = content_sha16("hello");
    assert_eq!(a, b);
    assert_eq!(a.len(), 16);
  }

  #[test]
  fn different_values_hash_differently() {
    assert_ne!(content_sha16("a"), content_sha16("b"));
  }
}
