//! Parsed port mappings (`Service.ports`). Compose allows either a short
//! string form (`"8080:80/tcp"`) or a long mapping form; both decode to
//! the same struct so later stages never need to special-case the
//! source syntax.

use serde_yaml_ng::Value;

use super::yaml_ext::{build_mapping, split_mapping, Extra};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
  Tcp,
  Udp,
  Sctp,
}

impl Protocol {
  fn parse(s: &str) -> Option<Self> {
    match s {
      "tcp" => Some(Self::Tcp),
      "udp" => Some(Self::Udp),
      "sctp" => Some(Self::Sctp),
      _ => None,
    }
  }

  fn as_str(self) -> &'static str {
    match self {
      Self::Tcp => "tcp",
      Self::Udp => "udp",
      Self::Sctp => "sctp",
    }
  }
}

impl Default for Protocol {
  fn default() -> Self {
    Self::Tcp
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
  Ingress,
  Host,
}

impl PublishMode {
  fn parse(s: &str) -> Option<Self> {
    match s {
      "ingress" => Some(Self::Ingress),
      "host" => Some(Self::Host),
      _ => None,
    }
  }

  fn as_str(self) -> &'static str {
    match self {
      Self::Ingress => "ingress",
      Self::Host => "host",
    }
  }
}

impl Default for PublishMode {
  fn default() -> Self {
    Self::Ingress
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
  pub target: u16,
  pub published: Option<String>,
  pub protocol: Protocol,
  pub mode: PublishMode,
  /// `true` if this entry was read from the short string syntax, so the
  /// encoder re-emits the same syntax rather than always expanding to the
  /// long mapping form.
  pub short_syntax: bool,
  pub extra: Extra,
}

const KNOWN_KEYS: &[&str] = &["target", "published", "protocol", "mode"];

impl PortMapping {
  pub fn decode(value: &Value) -> Result<Self, String> {
    if let Some(s) = value.as_str() {
      return Self::parse_short(s);
    }
    if let Value::Mapping(map) = value {
      let (known, extra) = split_mapping(map.clone(), KNOWN_KEYS);
      let target = known
        .get("target")
        .and_then(Value::as_u64)
        .ok_or_else(|| "port mapping missing numeric 'target'".to_string())?;
      let published = known.get("published").and_then(super::yaml_ext::scalar_to_string);
      let protocol = known
        .get("protocol")
        .and_then(Value::as_str)
        .and_then(Protocol::parse)
        .unwrap_or_default();
      let mode = known
        .get("mode")
        .and_then(Value::as_str)
        .and_then(PublishMode::parse)
        .unwrap_or_default();
      return Ok(Self {
        target: target as u16,
        published,
        protocol,
        mode,
        short_syntax: false,
        extra,
      });
    }
    Err(format!("port mapping must be a string or mapping, found {value:?}"))
  }

  fn parse_short(s: &str) -> Result<Self, String> {
    let (host_part, rest) = match s.split_once('/') {
      Some((h, proto)) => (h, Some(proto)),
      None => (s, None),
    };
    let protocol = rest.and_then(Protocol::parse).unwrap_or_default();
    let (published, target_str) = match host_part.rsplit_once(':') {
      Some((published, target)) => (Some(published.to_string()), target),
      None => (None, host_part),
    };
    let target = target_str
      .parse::<u16>()
      .map_err(|_| format!("invalid port target in '{s}'"))?;
    Ok(Self {
      target,
      published,
      protocol,
      mode: PublishMode::default(),
      short_syntax: true,
      extra: Extra::new(),
    })
  }

  pub fn encode(&self) -> Value {
    if self.short_syntax && self.extra.is_empty() && matches!(self.mode, PublishMode::Ingress) {
      let mut s = match &self.published {
        Some(p) => format!("{p}:{}", self.target),
        None => self.target.to_string(),
      };
      if !matches!(self.protocol, Protocol::Tcp) {
        s = format!("{s}/{}", self.protocol.as_str());
      }
      return Value::String(s);
    }
    let fields = vec![
      ("target", Some(Value::Number(self.target.into()))),
      ("published", self.published.clone().map(Value::String)),
      ("protocol", Some(Value::String(self.protocol.as_str().to_string()))),
      ("mode", Some(Value::String(self.mode.as_str().to_string()))),
    ];
    Value::Mapping(build_mapping(fields, &self.extra))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn short_syntax_round_trips() {
    let value: Value = serde_yaml_ng::from_str("\"8080:80/udp\"").unwrap();
    let decoded = PortMapping::decode(&value).unwrap();
    assert_eq!(decoded.target, 80);
    assert_eq!(decoded.published, Some("8080".to_string()));
    assert_eq!(decoded.protocol, Protocol::Udp);
    let re_encoded = decoded.encode();
    assert_eq!(re_encoded.as_str(), Some("8080:80/udp"));
  }

  #[test]
  fn long_syntax_decodes_fields() {
    let value: Value = serde_yaml_ng::from_str("target: 80\npublished: 8080\nmode: host").unwrap();
    let decoded = PortMapping::decode(&value).unwrap();
    assert_eq!(decoded.mode, PublishMode::Host);
    assert!(!decoded.short_syntax);
  }
}
