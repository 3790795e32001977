//! Aggregates provider outputs and applies the include/rename/replace/
//! key-template pipeline (spec.md §4.5).

use std::path::Path;
use std::time::Duration;

use indexmap::IndexMap;
use swarmbender_client::error::SbError;

use super::provider::Provider;
use crate::util::glob::key_matches_any_include;

/// Per-operation deadline for a single provider's `get` call (spec.md
/// §5: "default: 30s render-side provider call").
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ReplaceRule {
  pub from: String,
  pub to: String,
}

/// The policy-driven transform from a raw provider key to the `flatKey`
/// the rest of the system stores and looks up.
#[derive(Debug, Clone, Default)]
pub struct KeyPipeline {
  pub includes: Vec<String>,
  pub rename: IndexMap<String, String>,
  pub replace: Vec<ReplaceRule>,
  pub key_template: Option<String>,
}

impl KeyPipeline {
  /// `None` means the key was excluded by the include filter.
  pub fn apply_upload(&self, flat_key: &str, scope: &str) -> Option<String> {
    if !key_matches_any_include(flat_key, &self.includes) {
      return None;
    }
    if let Some(renamed) = self.rename.get(flat_key) {
      return Some(renamed.clone());
    }
    let replaced = self.replace.iter().fold(flat_key.to_string(), |acc, rule| acc.replace(&rule.from, &rule.to));
    let templated = match &self.key_template {
      Some(template) => template.replace("{key}", &replaced).replace("{scope}", scope),
      None => replaced,
    };
    Some(templated)
  }

  /// Reverses [`Self::apply_upload`]'s replace step only (rename/include
  /// are not invertible in general — a provider's raw key is recovered
  /// from the secrets map's own `flatKey`, not re-derived). Exposed for
  /// providers that need to map an external key observed on the engine
  /// back to something close to the original flat key for diagnostics.
  pub fn reverse_replace(&self, external_key: &str) -> String {
    self
      .replace
      .iter()
      .rev()
      .fold(external_key.to_string(), |acc, rule| acc.replace(&rule.to, &rule.from))
  }
}

/// Aggregates outputs from providers in declared order (last-wins on
/// key collision), isolating individual provider failures (spec.md §7:
/// "other providers still contribute; only if all required providers
/// fail does the sync abort").
pub struct ProviderHub {
  providers: Vec<Box<dyn Provider>>,
}

impl ProviderHub {
  pub fn new(providers: Vec<Box<dyn Provider>>) -> Self {
    Self { providers }
  }

  pub async fn aggregate(&self, root: &Path, scope: &str, env: &str) -> Result<IndexMap<String, String>, SbError> {
    let mut out = IndexMap::new();
    let mut failures = Vec::new();
    for provider in &self.providers {
      let outcome = tokio::time::timeout(PROVIDER_TIMEOUT, provider.get(root, scope, env))
        .await
        .unwrap_or_else(|_| Err(SbError::Timeout { op: provider.name().to_string() }));
      match outcome {
        Ok(candidates) => {
          tracing::debug!(provider = provider.name(), keys = candidates.len(), "provider contributed candidates");
          for (k, v) in candidates {
            out.insert(k, v);
          }
        }
        Err(e) => {
          tracing::warn!(provider = provider.name(), error = %e, "provider failed, isolating");
          failures.push((provider.name().to_string(), e));
        }
      }
    }
    if !self.providers.is_empty() && failures.len() == self.providers.len() {
      let (name, cause) = &failures[0];
      tracing::warn!(provider = %name, "all providers failed, aborting aggregate");
      return Err(SbError::Provider {
        provider: name.clone(),
        cause: cause.to_string(),
      });
    }
    Ok(out)
  }

  /// Aggregates, then applies the include/rename/replace/key-template
  /// pipeline, returning the final `flatKey -> value` candidate set.
  pub async fn aggregate_and_pipeline(
    &self,
    root: &Path,
    scope: &str,
    env: &str,
    pipeline: &KeyPipeline,
  ) -> Result<IndexMap<String, String>, SbError> {
    let raw = self.aggregate(root, scope, env).await?;
    let mut out = IndexMap::new();
    for (key, value) in raw {
      if let Some(final_key) = pipeline.apply_upload(&key, scope) {
        out.insert(final_key, value);
      }
    }
    Ok(out)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn apply_upload_honors_include_rename_replace_template() {
    let pipeline = KeyPipeline {
      includes: vec!["ConnectionStrings__*".to_string()],
      rename: IndexMap::from([("ConnectionStrings__Special".to_string(), "special-override".to_string())]),
      replace: vec![ReplaceRule {
        from: "__".to_string(),
        to: "::".to_string(),
      }],
      key_template: Some("{scope}/{key}".to_string()),
    };
    assert_eq!(pipeline.apply_upload("Redis__Hosts", "demo"), None);
    assert_eq!(
      pipeline.apply_upload("ConnectionStrings__Main", "demo"),
      Some("demo/ConnectionStrings::Main".to_string())
    );
    assert_eq!(
      pipeline.apply_upload("ConnectionStrings__Special", "demo"),
      Some("special-override".to_string())
    );
  }
}
