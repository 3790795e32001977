//! Secret providers (spec.md §4.5): `env` (process environment), `file`
//! (`secrets/files/<scope>/<env>/*.secret`), and the seam pluggable
//! external providers (Azure Key Vault, Infisical — out of scope here,
//! specified only through this trait per spec.md §1) attach to.

use std::path::Path;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use indexmap::IndexMap;
use swarmbender_client::error::SbError;

/// A source of `flatKey -> value` candidates for one `(scope, env)`.
/// Implementations never see the rename/replace/template pipeline —
/// that is applied uniformly by [`super::hub::ProviderHub`] after
/// aggregation. Returns a boxed future (rather than an `async fn`, which
/// is not object-safe) so the hub can hold a heterogeneous
/// `Vec<Box<dyn Provider>>` and still race each call against a
/// per-operation timeout (spec.md §5).
pub trait Provider: Send + Sync {
  fn name(&self) -> &str;
  fn get<'a>(&'a self, root: &'a Path, scope: &'a str, env: &'a str) -> BoxFuture<'a, Result<IndexMap<String, String>, SbError>>;
}

/// Reads candidates from the process environment. Every process
/// environment variable is a candidate; the include-glob stage in the
/// hub narrows this down, since an `env` provider has no namespace of
/// its own to scope by.
pub struct EnvProvider;

impl Provider for EnvProvider {
  fn name(&self) -> &str {
    "env"
  }

  fn get<'a>(&'a self, _root: &'a Path, _scope: &'a str, _env: &'a str) -> BoxFuture<'a, Result<IndexMap<String, String>, SbError>> {
    async { Ok(std::env::vars().collect()) }.boxed()
  }
}

/// Reads `secrets/files/<scope>/<env>/*.secret`, one file per key: the
/// file stem (minus `.secret`) is the flat key, the file contents
/// (trimmed of a single trailing newline, matching how `docker secret
/// create ... -` is typically fed) is the value.
pub struct FileProvider;

impl Provider for FileProvider {
  fn name(&self) -> &str {
    "file"
  }

  fn get<'a>(&'a self, root: &'a Path, scope: &'a str, env: &'a str) -> BoxFuture<'a, Result<IndexMap<String, String>, SbError>> {
    async move {
      let dir = root.join("secrets").join("files").join(scope).join(env);
      let mut out = IndexMap::new();
      if !dir.is_dir() {
        return Ok(out);
      }
      let mut entries: Vec<_> = std::fs::read_dir(&dir)
        .map_err(|e| SbError::Provider {
          provider: "file".to_string(),
          cause: e.to_string(),
        })?
        .filter_map(Result::ok)
        .collect();
      entries.sort_by_key(|e| e.file_name());
      for entry in entries {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("secret") {
          continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
          continue;
        };
        let contents = std::fs::read_to_string(&path).map_err(|e| SbError::Provider {
          provider: "file".to_string(),
          cause: format!("{}: {e}", path.display()),
        })?;
        out.insert(stem.to_string(), contents.strip_suffix('\n').unwrap_or(&contents).to_string());
      }
      Ok(out)
    }
    .boxed()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn file_provider_reads_secret_files_as_stem_to_trimmed_content() {
    let tmp = tempfile::tempdir().unwrap();
    let scope_dir = tmp.path().join("secrets/files/demo_api/prod");
    std::fs::create_dir_all(&scope_dir).unwrap();
    std::fs::write(scope_dir.join("ConnStr.secret"), "value-with-newline\n").unwrap();
    let provider = FileProvider;
    let result = provider.get(tmp.path(), "demo_api", "prod").await.unwrap();
    assert_eq!(result.get("ConnStr"), Some(&"value-with-newline".to_string()));
  }

  #[tokio::test]
  async fn file_provider_missing_dir_is_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let provider = FileProvider;
    let result = provider.get(tmp.path(), "demo_api", "prod").await.unwrap();
    assert!(result.is_empty());
  }
}
