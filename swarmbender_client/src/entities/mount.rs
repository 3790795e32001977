//! `Service.volumes` entries and the `secrets`/`configs` service-level
//! references, which share the same `source/target` shape.

use serde_yaml_ng::Value;

use super::yaml_ext::{build_mapping, scalar_to_string, split_mapping, Extra};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountType {
  Volume,
  Bind,
  Tmpfs,
  Npipe,
}

impl MountType {
  fn parse(s: &str) -> Option<Self> {
    match s {
      "volume" => Some(Self::Volume),
      "bind" => Some(Self::Bind),
      "tmpfs" => Some(Self::Tmpfs),
      "npipe" => Some(Self::Npipe),
      _ => None,
    }
  }

  fn as_str(self) -> &'static str {
    match self {
      Self::Volume => "volume",
      Self::Bind => "bind",
      Self::Tmpfs => "tmpfs",
      Self::Npipe => "npipe",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
  pub kind: MountType,
  pub source: Option<String>,
  pub target: String,
  pub read_only: bool,
  /// `true` if read from the short `SRC:DST[:ro]` string syntax.
  pub short_syntax: bool,
  pub extra: Extra,
}

const KNOWN_KEYS: &[&str] = &["type", "source", "target", "read_only"];

impl Mount {
  pub fn decode(value: &Value) -> Result<Self, String> {
    if let Some(s) = value.as_str() {
      return Self::parse_short(s);
    }
    if let Value::Mapping(map) = value {
      let (known, extra) = split_mapping(map.clone(), KNOWN_KEYS);
      let kind = known
        .get("type")
        .and_then(Value::as_str)
        .and_then(MountType::parse)
        .unwrap_or(MountType::Volume);
      let target = known
        .get("target")
        .and_then(Value::as_str)
        .ok_or_else(|| "mount missing 'target'".to_string())?
        .to_string();
      let source = known.get("source").and_then(|v| scalar_to_string(v));
      let read_only = known.get("read_only").and_then(Value::as_bool).unwrap_or(false);
      return Ok(Self {
        kind,
        source,
        target,
        read_only,
        short_syntax: false,
        extra,
      });
    }
    Err(format!("volume entry must be a string or mapping, found {value:?}"))
  }

  fn parse_short(s: &str) -> Result<Self, String> {
    let parts: Vec<&str> = s.split(':').collect();
    match parts.as_slice() {
      [target] => Ok(Self {
        kind: MountType::Volume,
        source: None,
        target: target.to_string(),
        read_only: false,
        short_syntax: true,
        extra: Extra::new(),
      }),
      [source, target] => Ok(Self {
        kind: if source.starts_with('.') || source.starts_with('/') {
          MountType::Bind
        } else {
          MountType::Volume
        },
        source: Some(source.to_string()),
        target: target.to_string(),
        read_only: false,
        short_syntax: true,
        extra: Extra::new(),
      }),
      [source, target, mode] => Ok(Self {
        kind: if source.starts_with('.') || source.starts_with('/') {
          MountType::Bind
        } else {
          MountType::Volume
        },
        source: Some(source.to_string()),
        target: target.to_string(),
        read_only: *mode == "ro",
        short_syntax: true,
        extra: Extra::new(),
      }),
      _ => Err(format!("invalid volume short syntax '{s}'")),
    }
  }

  pub fn encode(&self) -> Value {
    if self.short_syntax && self.extra.is_empty() {
      let base = match &self.source {
        Some(src) => format!("{src}:{}", self.target),
        None => self.target.clone(),
      };
      let s = if self.read_only { format!("{base}:ro") } else { base };
      return Value::String(s);
    }
    let fields = vec![
      ("type", Some(Value::String(self.kind.as_str().to_string()))),
      ("source", self.source.clone().map(Value::String)),
      ("target", Some(Value::String(self.target.clone()))),
      ("read_only", self.read_only.then_some(Value::Bool(true))),
    ];
    Value::Mapping(build_mapping(fields, &self.extra))
  }
}

/// Shared shape for `Service.secrets` and `Service.configs` entries:
/// `{source, target?, uid?, gid?, mode?}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefMount {
  pub source: String,
  pub target: Option<String>,
  pub uid: Option<String>,
  pub gid: Option<String>,
  pub mode: Option<u32>,
  pub short_syntax: bool,
  pub extra: Extra,
}

const REF_KNOWN_KEYS: &[&str] = &["source", "target", "uid", "gid", "mode"];

impl RefMount {
  pub fn decode(value: &Value) -> Result<Self, String> {
    if let Some(s) = value.as_str() {
      return Ok(Self {
        source: s.to_string(),
        target: None,
        uid: None,
        gid: None,
        mode: None,
        short_syntax: true,
        extra: Extra::new(),
      });
    }
    if let Value::Mapping(map) = value {
      let (known, extra) = split_mapping(map.clone(), REF_KNOWN_KEYS);
      let source = known
        .get("source")
        .and_then(Value::as_str)
        .ok_or_else(|| "secret/config reference missing 'source'".to_string())?
        .to_string();
      let target = known.get("target").and_then(Value::as_str).map(str::to_string);
      let uid = known.get("uid").and_then(scalar_to_string);
      let gid = known.get("gid").and_then(scalar_to_string);
      let mode = known.get("mode").and_then(Value::as_u64).map(|v| v as u32);
      return Ok(Self {
        source,
        target,
        uid,
        gid,
        mode,
        short_syntax: false,
        extra,
      });
    }
    Err(format!("secret/config reference must be a string or mapping, found {value:?}"))
  }

  pub fn encode(&self) -> Value {
    if self.short_syntax && self.extra.is_empty() {
      return Value::String(self.source.clone());
    }
    let fields = vec![
      ("source", Some(Value::String(self.source.clone()))),
      ("target", self.target.clone().map(Value::String)),
      ("uid", self.uid.clone().map(Value::String)),
      ("gid", self.gid.clone().map(Value::String)),
      ("mode", self.mode.map(|m| Value::Number(m.into()))),
    ];
    Value::Mapping(build_mapping(fields, &self.extra))
  }
}
