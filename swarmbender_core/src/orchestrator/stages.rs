//! The seven render pipeline stages (spec.md §4.4). Each stage function
//! owns exactly the `RenderContext` fields the stage table names for it;
//! `super::render` runs them in ascending order and wraps any error as
//! `SbError::Pipeline{stage, cause}`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use serde_yaml_ng::Value;
use swarmbender_client::entities::mount::RefMount;
use swarmbender_client::entities::network::TopLevelSecretOrConfig;
use swarmbender_client::entities::union::ListOrMap;
use swarmbender_client::entities::{AppSettingsMode, CaseInsensitiveMap, ComposeFile, SecretsMap};
use swarmbender_client::error::SbError;

use super::context::{RenderContext, GLOBAL_SCOPE};
use super::RenderOutcome;
use crate::env_resolver::{parse_env_file, parse_use_envvars, EnvironmentBuilder};
use crate::merge::{expand_wildcard_services, known_service_names, merge_values};
use crate::token::expand_value;
use crate::util::flatten::{flatten_json, unflatten_json};
use crate::util::glob::{expand_template, list_matching_files};
use crate::util::hash::content_sha16;
use crate::util::sanitize::{normalize_and_clamp, sanitize_path_component};

/// Fixed Swarm-config mount point for `AppSettingsMode::Config`
/// (spec.md §9 Open Question: kept fixed rather than per-service
/// configurable — see DESIGN.md).
pub const APPSETTINGS_CONFIG_TARGET: &str = "/app/appsettings.json";

fn read_to_string(path: &Path, stage: &'static str) -> Result<String, SbError> {
  std::fs::read_to_string(path).map_err(|e| SbError::pipeline(stage, anyhow::anyhow!("reading {}: {e}", path.display())))
}

fn parse_yaml_value(text: &str, path: &Path) -> Result<Value, SbError> {
  serde_yaml_ng::from_str(text).map_err(|e| SbError::MalformedDocument {
    path: path.to_path_buf(),
    offset: e.location().map(|l| l.index()),
    reason: e.to_string(),
  })
}

/// Stage 100. Loads the typed template, seeding both `ctx.template` and
/// `ctx.working` (a fresh clone).
pub fn load_template(ctx: &mut RenderContext) -> Result<(), SbError> {
  let path = ctx.request.stacks_dir().join(&ctx.request.stack_id).join("docker-stack.template.yml");
  let bytes = std::fs::read(&path).map_err(|e| SbError::pipeline("LoadTemplate", anyhow::anyhow!("reading {}: {e}", path.display())))?;
  let template = ComposeFile::decode(&bytes, &path)?;
  ctx.working = template.clone();
  ctx.template = template;
  Ok(())
}

fn vars_for<'a>(stack_id: &'a str, env: &'a str, svc: Option<&'a str>) -> std::collections::BTreeMap<&'static str, &'a str> {
  let mut vars = std::collections::BTreeMap::new();
  vars.insert("stackId", stack_id);
  vars.insert("env", env);
  if let Some(svc) = svc {
    vars.insert("svc", svc);
  }
  vars
}

fn list_service_dirs(root: &Path) -> Vec<String> {
  let dir = root.join("services");
  let Ok(entries) = std::fs::read_dir(&dir) else {
    return Vec::new();
  };
  let mut names: Vec<String> = entries
    .filter_map(Result::ok)
    .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
    .filter_map(|e| e.file_name().into_string().ok())
    .collect();
  names.sort();
  names
}

/// Merges one overlay document (already parsed, wildcard-expanded
/// against the services known so far) into `working_value`.
fn merge_overlay_file(working_value: Value, path: &Path) -> Result<Value, SbError> {
  let text = read_to_string(path, "ApplyOverlays")?;
  let mut overlay = parse_yaml_value(&text, path)?;
  let known = known_service_names(&working_value);
  expand_wildcard_services(&mut overlay, &known);
  Ok(merge_values(working_value, overlay, None))
}

/// Merges a service-scoped overlay fragment (a bare `Service` document,
/// no `services:` wrapper — the path already names the service) into
/// `working_value` under `services.<svc>`.
fn merge_service_overlay_file(working_value: Value, svc: &str, path: &Path) -> Result<Value, SbError> {
  let text = read_to_string(path, "ApplyOverlays")?;
  let fragment = parse_yaml_value(&text, path)?;
  let mut wrapper = serde_yaml_ng::Mapping::new();
  let mut services = serde_yaml_ng::Mapping::new();
  services.insert(Value::String(svc.to_string()), fragment);
  wrapper.insert(Value::String("services".to_string()), Value::Mapping(services));
  Ok(merge_values(working_value, Value::Mapping(wrapper), None))
}

/// Reads every `appsettings*.json` file in `dir`, flattening and
/// merging (last file wins on key collision, spec.md §4.3).
fn collect_appsettings_json(dir: &Path) -> Result<CaseInsensitiveMap<String>, SbError> {
  let mut out = CaseInsensitiveMap::new();
  let pattern = dir.join("appsettings*.json");
  let Some(pattern_str) = pattern.to_str() else {
    return Ok(out);
  };
  let files = list_matching_files(pattern_str).map_err(|e| SbError::pipeline("ApplyOverlays", anyhow::anyhow!(e)))?;
  for file in files {
    let text = read_to_string(&file, "ApplyOverlays")?;
    let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| SbError::SchemaViolation {
      path: file.clone(),
      reason: e.to_string(),
    })?;
    for (k, v) in flatten_json(&json) {
      out.insert(k, v);
    }
  }
  Ok(out)
}

/// Stage 200. Merges overlays in declared order, expanding wildcard
/// services before each merge, then collects `appsettings*.json`
/// contributions and the `use-envvars.json` process-env allowlist.
pub fn apply_overlays(ctx: &mut RenderContext) -> Result<(), SbError> {
  let root = ctx.request.root_path.clone();
  let env = ctx.request.env.clone();
  let stack_id = ctx.request.stack_id.clone();
  let overlay_order = ctx.config.render.overlay_order.clone();

  let mut working_value = ctx.working.encode();
  for template in &overlay_order {
    if template.contains("{svc}") {
      for svc in list_service_dirs(&root) {
        let vars = vars_for(&stack_id, &env, Some(&svc));
        let expanded = expand_template(template, &vars);
        let pattern = root.join(&expanded);
        let Some(pattern_str) = pattern.to_str() else { continue };
        let files = list_matching_files(pattern_str).map_err(|e| SbError::pipeline("ApplyOverlays", anyhow::anyhow!(e)))?;
        for file in files {
          working_value = merge_service_overlay_file(working_value, &svc, &file)?;
        }
      }
    } else {
      let vars = vars_for(&stack_id, &env, None);
      let expanded = expand_template(template, &vars);
      let pattern = root.join(&expanded);
      let Some(pattern_str) = pattern.to_str() else { continue };
      let files = list_matching_files(pattern_str).map_err(|e| SbError::pipeline("ApplyOverlays", anyhow::anyhow!(e)))?;
      for file in files {
        working_value = merge_overlay_file(working_value, &file)?;
      }
    }
  }

  let path_hint = ctx.request.stacks_dir().join(&stack_id).join("docker-stack.template.yml");
  ctx.working = ComposeFile::decode_value(working_value, &path_hint)?;

  let global_appsettings_dir = root.join("stacks").join("all").join(&env).join("env");
  ctx.aggregated_environment.insert(GLOBAL_SCOPE.to_string(), collect_appsettings_json(&global_appsettings_dir)?);
  for svc in ctx.working.services.keys().cloned().collect::<Vec<_>>() {
    let service_appsettings_dir = root.join("services").join(&svc).join("env").join(&env);
    ctx.aggregated_environment.insert(svc, collect_appsettings_json(&service_appsettings_dir)?);
  }

  let use_envvars_path = global_appsettings_dir.join("use-envvars.json");
  if use_envvars_path.is_file() {
    let text = read_to_string(&use_envvars_path, "ApplyOverlays")?;
    let allowlist = parse_use_envvars(&text)?;
    for name in allowlist {
      if let Ok(value) = std::env::var(&name) {
        ctx.process_env_allowlist.insert(name, value);
      }
    }
  }

  Ok(())
}

/// Stage 300. Builds each service's final `environment` map. Under
/// `AppSettingsMode::Config` the aggregated app-settings contributions
/// collected at stage 200 are left untouched here — `SecretsAttach`
/// (500) serializes them to a mounted config instead.
pub fn environment_apply(ctx: &mut RenderContext) -> Result<(), SbError> {
  let root = ctx.request.root_path.clone();
  let use_env_mode = ctx.request.app_settings_mode == AppSettingsMode::Env;
  let use_envvars: HashSet<String> = ctx.process_env_allowlist.keys().cloned().collect();

  let service_names: Vec<String> = ctx.working.services.keys().cloned().collect();
  for svc in service_names {
    let mut aggregated_overlay: IndexMap<String, String> = IndexMap::new();
    if use_env_mode {
      if let Some(global) = ctx.aggregated_environment.get(GLOBAL_SCOPE) {
        for (k, v) in global.iter() {
          aggregated_overlay.insert(k.to_string(), v.clone());
        }
      }
      if let Some(service_specific) = ctx.aggregated_environment.get(&svc) {
        for (k, v) in service_specific.iter() {
          aggregated_overlay.insert(k.to_string(), v.clone());
        }
      }
    }

    let service = ctx.working.services.get(&svc).expect("iterating known keys");
    let mut env_files = Vec::new();
    if let Some(env_file) = &service.env_file {
      for rel in env_file.as_list() {
        let path = root.join(&rel);
        if path.is_file() {
          let text = read_to_string(&path, "EnvironmentApply")?;
          env_files.push(parse_env_file(&text));
        }
      }
    }

    let builder = EnvironmentBuilder {
      env_files,
      service_environment: service.environment.as_ref(),
      aggregated_overlay: &aggregated_overlay,
      allowlisted_process_env: &ctx.process_env_allowlist,
      use_envvars: &use_envvars,
    };
    let resolved = builder.build();

    let service = ctx.working.services.get_mut(&svc).expect("iterating known keys");
    let shape = service.environment.clone().unwrap_or(ListOrMap::Map(IndexMap::new()));
    let resolved_as_option_map: IndexMap<String, Option<String>> = resolved.iter().map(|(k, v)| (k.clone(), Some(v.clone()))).collect();
    service.environment = Some(shape.from_map_like(resolved_as_option_map));
    ctx.resolved_environment.insert(svc, resolved);
  }

  Ok(())
}

/// Expands `group_labels.*` entries (each a `KEY=VALUE` or bare `KEY`
/// string, the same shape `ListOrMap::List` accepts) into a map.
fn group_entries_to_map(entries: &[String]) -> IndexMap<String, Option<String>> {
  ListOrMap::List(entries.to_vec()).to_map()
}

/// Stage 400. Computes one final label map per service from its
/// `x-sb-groups` (looked up in `SbConfig.metadata.groups`) overlaid by
/// the service's own `labels`/`deploy.labels`, then writes that same
/// final map back to both fields.
pub fn labels(ctx: &mut RenderContext) -> Result<(), SbError> {
  let groups = ctx.config.metadata.groups.clone().unwrap_or_default();
  let service_names: Vec<String> = ctx.working.services.keys().cloned().collect();

  for svc in service_names {
    let service = ctx.working.services.get(&svc).expect("iterating known keys");
    let mut merged: IndexMap<String, Option<String>> = IndexMap::new();
    for group_name in &service.x_sb_groups {
      if let Some(entries) = groups.get(group_name) {
        for (k, v) in group_entries_to_map(entries) {
          merged.insert(k, v);
        }
      }
    }
    if let Some(existing) = &service.labels {
      for (k, v) in existing.to_map() {
        merged.insert(k, v);
      }
    }
    if let Some(deploy) = &service.deploy {
      if let Some(existing) = &deploy.labels {
        for (k, v) in existing.to_map() {
          merged.insert(k, v);
        }
      }
    }

    let service = ctx.working.services.get_mut(&svc).expect("iterating known keys");
    let label_shape = service.labels.clone().unwrap_or(ListOrMap::Map(IndexMap::new()));
    service.labels = Some(label_shape.from_map_like(merged.clone()));
    if let Some(deploy) = service.deploy.as_mut() {
      let deploy_shape = deploy.labels.clone().unwrap_or(ListOrMap::Map(IndexMap::new()));
      deploy.labels = Some(deploy_shape.from_map_like(merged.clone()));
    }

    ctx.aggregated_labels.insert(svc, merged.into_iter().map(|(k, v)| (k, v.unwrap_or_default())).collect());
  }
  Ok(())
}

/// Stage 500. Reads the persisted secrets map and attaches one
/// `RefMount` per `x-sb-secrets` entry; under `AppSettingsMode::Config`
/// also mounts the per-service app-settings config built from stage
/// 200's aggregated JSON (spec.md §4.3, §4.6).
pub fn secrets_attach(ctx: &mut RenderContext) -> Result<(), SbError> {
  let map_path = ctx.request.ops_dir().join("vars").join(format!("secrets-map.{}.yml", ctx.request.env));
  let map: SecretsMap = if map_path.is_file() {
    let text = read_to_string(&map_path, "SecretsAttach")?;
    serde_yaml_ng::from_str(&text).map_err(|e| SbError::Config(swarmbender_client::error::ConfigError::Parse {
      path: map_path.clone(),
      source: e,
    }))?
  } else {
    SecretsMap::new()
  };
  ctx.secrets_bag.map = map;

  let service_names: Vec<String> = ctx.working.services.keys().cloned().collect();
  let config_mode = ctx.request.app_settings_mode == AppSettingsMode::Config;

  for svc in service_names {
    let service = ctx.working.services.get(&svc).expect("iterating known keys");
    let mut new_secret_refs = Vec::new();
    for (flat_key, target) in service.x_sb_secrets.clone() {
      let Some(external_name) = ctx.secrets_bag.map.get(&flat_key) else {
        return Err(SbError::pipeline(
          "SecretsAttach",
          anyhow::anyhow!("service '{svc}' references secret key '{flat_key}' with no entry in the secrets map for env '{}'", ctx.request.env),
        ));
      };
      let external_name = external_name.to_string();
      new_secret_refs.push(RefMount {
        source: external_name.clone(),
        target: Some(target),
        uid: None,
        gid: None,
        mode: None,
        short_syntax: false,
        extra: Default::default(),
      });
      ctx.working.secrets.entry(external_name.clone()).or_insert_with(|| TopLevelSecretOrConfig::external_named(external_name));
    }

    let mut new_config_ref = None;
    if config_mode {
      let mut combined: IndexMap<String, String> = IndexMap::new();
      if let Some(global) = ctx.aggregated_environment.get(GLOBAL_SCOPE) {
        for (k, v) in global.iter() {
          combined.insert(k.to_string(), v.to_string());
        }
      }
      if let Some(service_specific) = ctx.aggregated_environment.get(&svc) {
        for (k, v) in service_specific.iter() {
          combined.insert(k.to_string(), v.to_string());
        }
      }
      if !combined.is_empty() {
        let json = unflatten_json(&combined);
        let content = serde_json::to_string_pretty(&json)
          .map_err(|e| SbError::pipeline("SecretsAttach", anyhow::anyhow!("serializing app-settings config for '{svc}': {e}")))?;
        let config_name = normalize_and_clamp(&format!("sb_config_{svc}_{}_{}", ctx.request.env, content_sha16(&content)));
        ctx
          .working
          .configs
          .entry(config_name.clone())
          .or_insert_with(|| TopLevelSecretOrConfig::external_named(config_name.clone()));
        new_config_ref = Some(RefMount {
          source: config_name,
          target: Some(APPSETTINGS_CONFIG_TARGET.to_string()),
          uid: None,
          gid: None,
          mode: None,
          short_syntax: false,
          extra: Default::default(),
        });
      }
    }

    let service = ctx.working.services.get_mut(&svc).expect("iterating known keys");
    service.secrets.extend(new_secret_refs);
    if let Some(config_ref) = new_config_ref {
      service.configs.push(config_ref);
    }
  }
  Ok(())
}

fn token_env_for(global: &IndexMap<String, String>, service: Option<&IndexMap<String, String>>) -> IndexMap<String, String> {
  let mut out = global.clone();
  if let Some(service) = service {
    for (k, v) in service {
      out.insert(k.clone(), v.clone());
    }
  }
  out
}

/// Stage 600. Expands `${NAME}`/`${NAME:-default}`/`${ENVVARS}` tokens.
/// Each service's subtree is expanded against that service's own
/// resolved environment (so `${ENVVARS}` reflects only that service);
/// everything else in the document is expanded against the process-env
/// allowlist and `SbConfig.Tokens.User` alone.
pub fn token_expand(ctx: &mut RenderContext) -> Result<(), SbError> {
  let mut global_env: IndexMap<String, String> = ctx.process_env_allowlist.clone();
  for (k, v) in &ctx.config.tokens.user {
    global_env.insert(k.clone(), v.clone());
  }

  let whole = ctx.working.encode();
  let Value::Mapping(mut root) = whole else {
    return Err(SbError::pipeline("TokenExpand", anyhow::anyhow!("rendered document is not a mapping")));
  };
  let services_value = root.shift_remove("services");

  let expanded_root_value = expand_value(Value::Mapping(root), &global_env, "root")?;
  let Value::Mapping(mut root) = expanded_root_value else {
    unreachable!("expand_value preserves the mapping shape");
  };

  if let Some(Value::Mapping(services)) = services_value {
    let mut expanded_services = serde_yaml_ng::Mapping::new();
    for (key, value) in services {
      let svc_name = key.as_str().unwrap_or_default().to_string();
      let svc_env = token_env_for(&global_env, ctx.resolved_environment.get(&svc_name));
      let location = format!("services.{svc_name}");
      let expanded = expand_value(value, &svc_env, &location)?;
      expanded_services.insert(key, expanded);
    }
    root.insert(Value::String("services".to_string()), Value::Mapping(expanded_services));
  }

  let path_hint = ctx.request.stacks_dir().join(&ctx.request.stack_id).join("docker-stack.template.yml");
  ctx.working = ComposeFile::decode_value(Value::Mapping(root), &path_hint)?;
  Ok(())
}

fn healthcheck_test_pattern() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"(?m)^([ ]*)test:\n((?:[ ]*- .*\n)+)").unwrap())
}

/// Rewrites every block-style `test:` sequence under a `healthcheck:`
/// mapping into flow style (`test: [a, b, c]`), the one documented
/// exception to otherwise-block emission (spec.md §4.1). `serde_yaml_ng`
/// carries no per-node style flag, so this runs as a text post-process
/// over the already-serialized document.
fn flow_style_healthcheck_test(yaml_text: &str) -> String {
  healthcheck_test_pattern()
    .replace_all(yaml_text, |caps: &regex::Captures| {
      let indent = &caps[1];
      let items: Vec<String> = caps[2]
        .lines()
        .map(|line| line.trim_start().trim_start_matches("- ").trim().to_string())
        .collect();
      format!("{indent}test: [{}]\n", items.join(", "))
    })
    .into_owned()
}

/// Stage 800. Serializes `ctx.working`, applies the flow-style
/// post-process, and writes the output (plus an optional history copy).
pub fn serialize(ctx: &mut RenderContext) -> Result<RenderOutcome, SbError> {
  let value = ctx.working.encode();
  let raw_yaml = serde_yaml_ng::to_string(&value).map_err(|e| SbError::pipeline("Serialize", anyhow::anyhow!(e)))?;
  let rendered_yaml = flow_style_healthcheck_test(&raw_yaml);

  let filename = format!(
    "{}-{}.stack.yml",
    sanitize_path_component(&ctx.request.stack_id),
    sanitize_path_component(&ctx.request.env)
  );
  let output_path = ctx.request.out_dir.join(&filename);
  write_file(&output_path, &rendered_yaml)?;

  let history_path = if ctx.request.write_history {
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let path: PathBuf = ctx.request.ops_dir().join("state").join(timestamp.to_string()).join(&filename);
    write_file(&path, &rendered_yaml)?;
    Some(path)
  } else {
    None
  };

  Ok(RenderOutcome {
    output_path,
    history_path,
    rendered_yaml,
  })
}

fn write_file(path: &Path, contents: &str) -> Result<(), SbError> {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).map_err(|e| SbError::pipeline("Serialize", anyhow::anyhow!("creating {}: {e}", parent.display())))?;
  }
  std::fs::write(path, contents).map_err(|e| SbError::pipeline("Serialize", anyhow::anyhow!("writing {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn flow_style_rewrites_block_sequence_test() {
    let yaml = "healthcheck:\n  test:\n  - CMD\n  - curl\n  - -f\n  interval: 10s\n";
    let rewritten = flow_style_healthcheck_test(yaml);
    assert_eq!(rewritten, "healthcheck:\n  test: [CMD, curl, -f]\n  interval: 10s\n");
  }

  #[test]
  fn flow_style_leaves_other_sequences_block() {
    let yaml = "ports:\n  - \"80:80\"\n  - \"443:443\"\n";
    assert_eq!(flow_style_healthcheck_test(yaml), yaml);
  }

  #[test]
  fn group_entries_to_map_splits_key_value() {
    let entries = vec!["tier=backend".to_string(), "public".to_string()];
    let map = group_entries_to_map(&entries);
    assert_eq!(map.get("tier"), Some(&Some("backend".to_string())));
    assert_eq!(map.get("public"), Some(&None));
  }
}
