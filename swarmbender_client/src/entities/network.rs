use serde_yaml_ng::Value;

use super::union::ExternalDef;
use super::yaml_ext::{build_mapping, split_mapping, Extra};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
  pub driver: Option<String>,
  pub external: Option<ExternalDef>,
  pub attachable: Option<bool>,
  pub extra: Extra,
}

const KNOWN_KEYS: &[&str] = &["driver", "external", "attachable"];

impl Network {
  pub fn decode(value: &Value) -> Result<Self, String> {
    let Value::Mapping(map) = value else {
      return Err(format!("network definition must be a mapping, found {value:?}"));
    };
    let (known, extra) = split_mapping(map.clone(), KNOWN_KEYS);
    let external = known.get("external").map(ExternalDef::decode).transpose().map_err(|e| e.to_string())?;
    Ok(Self {
      driver: known.get("driver").and_then(Value::as_str).map(str::to_string),
      external,
      attachable: known.get("attachable").and_then(Value::as_bool),
      extra,
    })
  }

  pub fn encode(&self) -> Value {
    let fields = vec![
      ("driver", self.driver.clone().map(Value::String)),
      ("external", self.external.as_ref().map(ExternalDef::encode)),
      ("attachable", self.attachable.map(Value::Bool)),
    ];
    Value::Mapping(build_mapping(fields, &self.extra))
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
  pub driver: Option<String>,
  pub external: Option<ExternalDef>,
  pub extra: Extra,
}

const VOLUME_KNOWN_KEYS: &[&str] = &["driver", "external"];

impl Volume {
  pub fn decode(value: &Value) -> Result<Self, String> {
    let Value::Mapping(map) = value else {
      return Err(format!("volume definition must be a mapping, found {value:?}"));
    };
    let (known, extra) = split_mapping(map.clone(), VOLUME_KNOWN_KEYS);
    let external = known.get("external").map(ExternalDef::decode).transpose().map_err(|e| e.to_string())?;
    Ok(Self {
      driver: known.get("driver").and_then(Value::as_str).map(str::to_string),
      external,
      extra,
    })
  }

  pub fn encode(&self) -> Value {
    let fields = vec![
      ("driver", self.driver.clone().map(Value::String)),
      ("external", self.external.as_ref().map(ExternalDef::encode)),
    ];
    Value::Mapping(build_mapping(fields, &self.extra))
  }
}

/// Top-level `secrets:`/`configs:` definitions (`external: {name}` or a
/// `file:` source). Only `external` is modeled explicitly per spec.md
/// §3; a `file:` key, if present, round-trips through `extra`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopLevelSecretOrConfig {
  pub external: Option<ExternalDef>,
  pub extra: Extra,
}

const TOP_LEVEL_KNOWN_KEYS: &[&str] = &["external"];

impl TopLevelSecretOrConfig {
  pub fn decode(value: &Value) -> Result<Self, String> {
    let Value::Mapping(map) = value else {
      return Err(format!("secret/config definition must be a mapping, found {value:?}"));
    };
    let (known, extra) = split_mapping(map.clone(), TOP_LEVEL_KNOWN_KEYS);
    let external = known.get("external").map(ExternalDef::decode).transpose().map_err(|e| e.to_string())?;
    Ok(Self { external, extra })
  }

  pub fn encode(&self) -> Value {
    let fields = vec![("external", self.external.as_ref().map(ExternalDef::encode))];
    Value::Mapping(build_mapping(fields, &self.extra))
  }

  pub fn external_named(name: impl Into<String>) -> Self {
    Self {
      external: Some(ExternalDef::Name(name.into())),
      extra: Extra::new(),
    }
  }
}
