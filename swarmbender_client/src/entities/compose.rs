use indexmap::IndexMap;
use serde_yaml_ng::Value;

use super::network::{Network, TopLevelSecretOrConfig, Volume};
use super::service::Service;
use super::yaml_ext::{build_mapping, split_mapping, Extra};
use crate::error::SbError;

const KNOWN_KEYS: &[&str] = &[
  "version",
  "name",
  "services",
  "networks",
  "volumes",
  "secrets",
  "configs",
  "x-sb-multi-tenant",
  "x-sb-groups",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeFile {
  pub version: Option<String>,
  pub name: Option<String>,
  pub services: IndexMap<String, Service>,
  pub networks: IndexMap<String, Network>,
  pub volumes: IndexMap<String, Volume>,
  pub secrets: IndexMap<String, TopLevelSecretOrConfig>,
  pub configs: IndexMap<String, TopLevelSecretOrConfig>,
  pub x_sb_multi_tenant: Option<bool>,
  pub x_sb_groups: Vec<String>,
  pub extra: Extra,
}

fn decode_map<T>(
  value: Option<&Value>,
  path: &std::path::Path,
  field: &'static str,
  decode_one: impl Fn(&Value) -> Result<T, String>,
) -> Result<IndexMap<String, T>, SbError> {
  let Some(value) = value else {
    return Ok(IndexMap::new());
  };
  let Value::Mapping(map) = value else {
    return Err(SbError::SchemaViolation {
      path: path.to_path_buf(),
      reason: format!("'{field}' must be a mapping of name to definition"),
    });
  };
  let mut out = IndexMap::new();
  for (k, v) in map {
    let name = k.as_str().ok_or_else(|| SbError::SchemaViolation {
      path: path.to_path_buf(),
      reason: format!("'{field}' keys must be strings"),
    })?;
    let decoded = decode_one(v).map_err(|reason| SbError::SchemaViolation {
      path: path.to_path_buf(),
      reason: format!("{field}.{name}: {reason}"),
    })?;
    out.insert(name.to_string(), decoded);
  }
  Ok(out)
}

impl ComposeFile {
  /// Decodes raw YAML bytes into a typed compose document. `path` is
  /// used only to annotate errors.
  pub fn decode(bytes: &[u8], path: &std::path::Path) -> Result<Self, SbError> {
    let text = std::str::from_utf8(bytes).map_err(|e| SbError::MalformedDocument {
      path: path.to_path_buf(),
      offset: Some(e.valid_up_to()),
      reason: "document is not valid UTF-8".to_string(),
    })?;
    let value: Value = serde_yaml_ng::from_str(text).map_err(|e| SbError::MalformedDocument {
      path: path.to_path_buf(),
      offset: e.location().map(|l| l.index()),
      reason: e.to_string(),
    })?;
    Self::decode_value(value, path)
  }

  pub fn decode_value(value: Value, path: &std::path::Path) -> Result<Self, SbError> {
    let Value::Mapping(map) = value else {
      return Err(SbError::SchemaViolation {
        path: path.to_path_buf(),
        reason: "top-level document must be a mapping".to_string(),
      });
    };
    let (known, extra) = split_mapping(map, KNOWN_KEYS);

    let services = decode_map(known.get("services"), path, "services", Service::decode)?;
    let networks = decode_map(known.get("networks"), path, "networks", Network::decode)?;
    let volumes = decode_map(known.get("volumes"), path, "volumes", Volume::decode)?;
    let secrets = decode_map(known.get("secrets"), path, "secrets", TopLevelSecretOrConfig::decode)?;
    let configs = decode_map(known.get("configs"), path, "configs", TopLevelSecretOrConfig::decode)?;

    let x_sb_groups = match known.get("x-sb-groups") {
      Some(Value::Sequence(seq)) => seq.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
      _ => Vec::new(),
    };

    Ok(Self {
      version: known.get("version").and_then(super::yaml_ext::scalar_to_string),
      name: known.get("name").and_then(Value::as_str).map(str::to_string),
      services,
      networks,
      volumes,
      secrets,
      configs,
      x_sb_multi_tenant: known.get("x-sb-multi-tenant").and_then(Value::as_bool),
      x_sb_groups,
      extra,
    })
  }

  pub fn encode(&self) -> Value {
    let services_value = Value::Mapping({
      let mut map = serde_yaml_ng::Mapping::new();
      for (name, service) in &self.services {
        map.insert(Value::String(name.clone()), service.encode());
      }
      map
    });
    let networks_value = (!self.networks.is_empty()).then(|| {
      let mut map = serde_yaml_ng::Mapping::new();
      for (name, network) in &self.networks {
        map.insert(Value::String(name.clone()), network.encode());
      }
      Value::Mapping(map)
    });
    let volumes_value = (!self.volumes.is_empty()).then(|| {
      let mut map = serde_yaml_ng::Mapping::new();
      for (name, volume) in &self.volumes {
        map.insert(Value::String(name.clone()), volume.encode());
      }
      Value::Mapping(map)
    });
    let secrets_value = (!self.secrets.is_empty()).then(|| {
      let mut map = serde_yaml_ng::Mapping::new();
      for (name, secret) in &self.secrets {
        map.insert(Value::String(name.clone()), secret.encode());
      }
      Value::Mapping(map)
    });
    let configs_value = (!self.configs.is_empty()).then(|| {
      let mut map = serde_yaml_ng::Mapping::new();
      for (name, config) in &self.configs {
        map.insert(Value::String(name.clone()), config.encode());
      }
      Value::Mapping(map)
    });
    let groups_value =
      (!self.x_sb_groups.is_empty()).then(|| Value::Sequence(self.x_sb_groups.iter().cloned().map(Value::String).collect()));

    let fields = vec![
      ("version", self.version.clone().map(Value::String)),
      ("name", self.name.clone().map(Value::String)),
      ("services", Some(services_value)),
      ("networks", networks_value),
      ("volumes", volumes_value),
      ("secrets", secrets_value),
      ("configs", configs_value),
      ("x-sb-multi-tenant", self.x_sb_multi_tenant.map(Value::Bool)),
      ("x-sb-groups", groups_value),
    ];
    Value::Mapping(build_mapping(fields, &self.extra))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decode_then_encode_round_trips_a_minimal_document() {
    let yaml = "version: \"3.8\"\nservices:\n  api:\n    image: demo:1\n";
    let path = std::path::Path::new("docker-stack.template.yml");
    let decoded = ComposeFile::decode(yaml.as_bytes(), path).unwrap();
    assert_eq!(decoded.services.len(), 1);
    let re_decoded = ComposeFile::decode_value(decoded.encode(), path).unwrap();
    assert_eq!(decoded, re_decoded);
  }

  #[test]
  fn rejects_non_mapping_services() {
    let yaml = "services: []\n";
    let path = std::path::Path::new("docker-stack.template.yml");
    let err = ComposeFile::decode(yaml.as_bytes(), path).unwrap_err();
    assert!(matches!(err, SbError::SchemaViolation { .. }));
  }
}
