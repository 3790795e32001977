//! Secret name synthesis (spec.md §4.6): template expansion, Swarm-safe
//! normalization, 64-char clamping, and the documented fallback scheme.

use crate::util::sanitize::{matches_name_shape, normalize_and_clamp, sha8, slug};

/// `{scope}` in the name template: `stackId_serviceName` when both are
/// known, else `stackId` alone, else the literal scope string supplied
/// by the caller.
pub enum Scope<'a> {
  StackAndService { stack_id: &'a str, service: &'a str },
  Stack { stack_id: &'a str },
  Literal(&'a str),
}

impl Scope<'_> {
  /// The `{scope}` substitution for both [`synthesize_name`] and the
  /// hub's `KeyPipeline`/`aggregate_and_pipeline`, which take a plain
  /// `&str` scope rather than this enum.
  pub fn template_value(&self) -> String {
    match self {
      Scope::StackAndService { stack_id, service } => format!("{stack_id}_{service}"),
      Scope::Stack { stack_id } => stack_id.to_string(),
      Scope::Literal(s) => s.to_string(),
    }
  }
}

/// Expands `name_template` (default `sb_{scope}_{env}_{key}_{version}`)
/// and normalizes the result to the Swarm-safe alphabet, clamped to 64
/// chars. Falls back to the documented scheme if normalization still
/// fails to produce a name matching the required shape.
pub fn synthesize_name(name_template: &str, scope: &Scope, env: &str, key: &str, version: &str) -> String {
  let expanded = name_template
    .replace("{scope}", &scope.template_value())
    .replace("{env}", env)
    .replace("{key}", key)
    .replace("{version}", version);
  let candidate = normalize_and_clamp(&expanded);
  if matches_name_shape(&candidate) {
    return candidate;
  }
  fallback_name(scope, env, key, version)
}

fn fallback_name(scope: &Scope, env: &str, key: &str, version: &str) -> String {
  let (stack_slug, service_slug) = match scope {
    Scope::StackAndService { stack_id, service } => (slug(stack_id), slug(service)),
    Scope::Stack { stack_id } => (slug(stack_id), String::new()),
    Scope::Literal(s) => (slug(s), String::new()),
  };
  let candidate = if service_slug.is_empty() {
    format!("sb_{stack_slug}_{env}_{}_{}", sha8(key), sha8(version))
  } else {
    format!("sb_{stack_slug}_{service_slug}_{env}_{}_{}", sha8(key), sha8(version))
  };
  normalize_and_clamp(&candidate)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn synthesizes_clamped_name_within_shape() {
    let scope = Scope::StackAndService {
      stack_id: "payments-backend-x",
      service: "messaging-dispatcher",
    };
    let name = synthesize_name(
      "sb_{scope}_{env}_{key}_{version}",
      &scope,
      "prod",
      "Kafka__Bootstrap__Servers",
      "0123456789abcdef",
    );
    assert!(name.len() <= 64);
    assert!(matches_name_shape(&name));
  }

  #[test]
  fn literal_scope_is_used_verbatim() {
    let scope = Scope::Literal("global");
    let name = synthesize_name("sb_{scope}_{env}_{key}_{version}", &scope, "dev", "Foo", "abc123");
    assert_eq!(name, "sb_global_dev_Foo_abc123");
  }
}
