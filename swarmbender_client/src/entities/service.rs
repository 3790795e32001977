use indexmap::IndexMap;
use serde_yaml_ng::Value;

use super::deploy::Deploy;
use super::healthcheck::Healthcheck;
use super::logging::Logging;
use super::mount::{Mount, RefMount};
use super::ports::PortMapping;
use super::union::{ExtraHosts, ListOrMap, ScalarOrList, ServiceNetworks, Sysctls, UlimitEntry};
use super::yaml_ext::{build_mapping, scalar_to_string, split_mapping, Extra};

const KNOWN_KEYS: &[&str] = &[
  "image",
  "command",
  "entrypoint",
  "environment",
  "labels",
  "ports",
  "volumes",
  "secrets",
  "configs",
  "deploy",
  "logging",
  "healthcheck",
  "depends_on",
  "networks",
  "env_file",
  "extra_hosts",
  "ulimits",
  "sysctls",
  "dns",
  "dns_search",
  "dns_opt",
  "user",
  "working_dir",
  "stop_grace_period",
  "stop_signal",
  "cap_add",
  "cap_drop",
  "devices",
  "tmpfs",
  "profiles",
  "x-sb-secrets",
  "x-sb-groups",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Service {
  pub image: Option<String>,
  pub command: Option<ScalarOrList>,
  pub entrypoint: Option<ScalarOrList>,
  pub environment: Option<ListOrMap>,
  pub labels: Option<ListOrMap>,
  pub ports: Vec<PortMapping>,
  pub volumes: Vec<Mount>,
  pub secrets: Vec<RefMount>,
  pub configs: Vec<RefMount>,
  pub deploy: Option<Deploy>,
  pub logging: Option<Logging>,
  pub healthcheck: Option<Healthcheck>,
  pub depends_on: Option<ListOrMap>,
  pub networks: Option<ServiceNetworks>,
  pub env_file: Option<ScalarOrList>,
  pub extra_hosts: Option<ExtraHosts>,
  pub ulimits: IndexMap<String, UlimitEntry>,
  pub sysctls: Option<Sysctls>,
  pub dns: Option<ScalarOrList>,
  pub dns_search: Option<ScalarOrList>,
  pub dns_opt: Vec<String>,
  pub user: Option<String>,
  pub working_dir: Option<String>,
  pub stop_grace_period: Option<String>,
  pub stop_signal: Option<String>,
  pub cap_add: Vec<String>,
  pub cap_drop: Vec<String>,
  pub devices: Vec<String>,
  pub tmpfs: Option<ScalarOrList>,
  pub profiles: Vec<String>,
  /// `x-sb-secrets: flatKey -> target path`, consumed by the
  /// SecretsAttach stage.
  pub x_sb_secrets: IndexMap<String, String>,
  pub x_sb_groups: Vec<String>,
  pub extra: Extra,
}

fn decode_string_list(value: &Value) -> Vec<String> {
  match value {
    Value::Sequence(seq) => seq.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
    _ => Vec::new(),
  }
}

fn encode_string_list(items: &[String]) -> Option<Value> {
  (!items.is_empty()).then(|| Value::Sequence(items.iter().cloned().map(Value::String).collect()))
}

impl Service {
  pub fn decode(value: &Value) -> Result<Self, String> {
    let Value::Mapping(map) = value else {
      return Err(format!("service definition must be a mapping, found {value:?}"));
    };
    let (known, extra) = split_mapping(map.clone(), KNOWN_KEYS);

    let command = known
      .get("command")
      .map(|v| ScalarOrList::decode("command", v))
      .transpose()
      .map_err(|e| e.to_string())?;
    let entrypoint = known
      .get("entrypoint")
      .map(|v| ScalarOrList::decode("entrypoint", v))
      .transpose()
      .map_err(|e| e.to_string())?;
    let environment = known
      .get("environment")
      .map(|v| ListOrMap::decode("environment", v))
      .transpose()
      .map_err(|e| e.to_string())?;
    let labels = known
      .get("labels")
      .map(|v| ListOrMap::decode("labels", v))
      .transpose()
      .map_err(|e| e.to_string())?;
    let ports = match known.get("ports") {
      Some(Value::Sequence(seq)) => seq.iter().map(PortMapping::decode).collect::<Result<Vec<_>, _>>()?,
      _ => Vec::new(),
    };
    let volumes = match known.get("volumes") {
      Some(Value::Sequence(seq)) => seq.iter().map(Mount::decode).collect::<Result<Vec<_>, _>>()?,
      _ => Vec::new(),
    };
    let secrets = match known.get("secrets") {
      Some(Value::Sequence(seq)) => seq.iter().map(RefMount::decode).collect::<Result<Vec<_>, _>>()?,
      _ => Vec::new(),
    };
    let configs = match known.get("configs") {
      Some(Value::Sequence(seq)) => seq.iter().map(RefMount::decode).collect::<Result<Vec<_>, _>>()?,
      _ => Vec::new(),
    };
    let deploy = known.get("deploy").map(Deploy::decode).transpose()?;
    let logging = known.get("logging").map(Logging::decode).transpose()?;
    let healthcheck = known.get("healthcheck").map(Healthcheck::decode).transpose()?;
    let depends_on = known
      .get("depends_on")
      .map(|v| ListOrMap::decode("depends_on", v))
      .transpose()
      .map_err(|e| e.to_string())?;
    let networks = known
      .get("networks")
      .map(ServiceNetworks::decode)
      .transpose()
      .map_err(|e| e.to_string())?;
    let env_file = known
      .get("env_file")
      .map(|v| ScalarOrList::decode("env_file", v))
      .transpose()
      .map_err(|e| e.to_string())?;
    let extra_hosts = known.get("extra_hosts").map(ExtraHosts::decode).transpose().map_err(|e| e.to_string())?;
    let mut ulimits = IndexMap::new();
    if let Some(Value::Mapping(map)) = known.get("ulimits") {
      for (k, v) in map {
        if let Some(k) = k.as_str() {
          ulimits.insert(k.to_string(), UlimitEntry::decode(v).map_err(|e| e.to_string())?);
        }
      }
    }
    let sysctls = known.get("sysctls").map(Sysctls::decode).transpose().map_err(|e| e.to_string())?;
    let dns = known
      .get("dns")
      .map(|v| ScalarOrList::decode("dns", v))
      .transpose()
      .map_err(|e| e.to_string())?;
    let dns_search = known
      .get("dns_search")
      .map(|v| ScalarOrList::decode("dns_search", v))
      .transpose()
      .map_err(|e| e.to_string())?;
    let dns_opt = known.get("dns_opt").map(decode_string_list).unwrap_or_default();
    let tmpfs = known
      .get("tmpfs")
      .map(|v| ScalarOrList::decode("tmpfs", v))
      .transpose()
      .map_err(|e| e.to_string())?;

    let mut x_sb_secrets = IndexMap::new();
    if let Some(Value::Mapping(map)) = known.get("x-sb-secrets") {
      for (k, v) in map {
        if let (Some(k), Some(v)) = (k.as_str(), v.as_str()) {
          x_sb_secrets.insert(k.to_string(), v.to_string());
        }
      }
    }
    let x_sb_groups = known.get("x-sb-groups").map(decode_string_list).unwrap_or_default();

    Ok(Self {
      image: known.get("image").and_then(Value::as_str).map(str::to_string),
      command,
      entrypoint,
      environment,
      labels,
      ports,
      volumes,
      secrets,
      configs,
      deploy,
      logging,
      healthcheck,
      depends_on,
      networks,
      env_file,
      extra_hosts,
      ulimits,
      sysctls,
      dns,
      dns_search,
      dns_opt,
      user: known.get("user").and_then(scalar_to_string),
      working_dir: known.get("working_dir").and_then(Value::as_str).map(str::to_string),
      stop_grace_period: known.get("stop_grace_period").and_then(scalar_to_string),
      stop_signal: known.get("stop_signal").and_then(Value::as_str).map(str::to_string),
      cap_add: known.get("cap_add").map(decode_string_list).unwrap_or_default(),
      cap_drop: known.get("cap_drop").map(decode_string_list).unwrap_or_default(),
      devices: known.get("devices").map(decode_string_list).unwrap_or_default(),
      tmpfs,
      profiles: known.get("profiles").map(decode_string_list).unwrap_or_default(),
      x_sb_secrets,
      x_sb_groups,
      extra,
    })
  }

  pub fn encode(&self) -> Value {
    let ulimits_value = (!self.ulimits.is_empty()).then(|| {
      let mut map = serde_yaml_ng::Mapping::new();
      for (k, v) in &self.ulimits {
        map.insert(Value::String(k.clone()), v.encode());
      }
      Value::Mapping(map)
    });
    let x_sb_secrets_value = (!self.x_sb_secrets.is_empty()).then(|| {
      let mut map = serde_yaml_ng::Mapping::new();
      for (k, v) in &self.x_sb_secrets {
        map.insert(Value::String(k.clone()), Value::String(v.clone()));
      }
      Value::Mapping(map)
    });

    let fields = vec![
      ("image", self.image.clone().map(Value::String)),
      ("command", self.command.as_ref().map(ScalarOrList::encode)),
      ("entrypoint", self.entrypoint.as_ref().map(ScalarOrList::encode)),
      ("environment", self.environment.as_ref().map(ListOrMap::encode)),
      ("labels", self.labels.as_ref().map(ListOrMap::encode)),
      (
        "ports",
        (!self.ports.is_empty()).then(|| Value::Sequence(self.ports.iter().map(PortMapping::encode).collect())),
      ),
      (
        "volumes",
        (!self.volumes.is_empty()).then(|| Value::Sequence(self.volumes.iter().map(Mount::encode).collect())),
      ),
      (
        "secrets",
        (!self.secrets.is_empty()).then(|| Value::Sequence(self.secrets.iter().map(RefMount::encode).collect())),
      ),
      (
        "configs",
        (!self.configs.is_empty()).then(|| Value::Sequence(self.configs.iter().map(RefMount::encode).collect())),
      ),
      ("deploy", self.deploy.as_ref().map(Deploy::encode)),
      ("logging", self.logging.as_ref().map(Logging::encode)),
      ("healthcheck", self.healthcheck.as_ref().map(Healthcheck::encode)),
      ("depends_on", self.depends_on.as_ref().map(ListOrMap::encode)),
      ("networks", self.networks.as_ref().map(ServiceNetworks::encode)),
      ("env_file", self.env_file.as_ref().map(ScalarOrList::encode)),
      ("extra_hosts", self.extra_hosts.as_ref().map(ExtraHosts::encode)),
      ("ulimits", ulimits_value),
      ("sysctls", self.sysctls.as_ref().map(Sysctls::encode)),
      ("dns", self.dns.as_ref().map(ScalarOrList::encode)),
      ("dns_search", self.dns_search.as_ref().map(ScalarOrList::encode)),
      ("dns_opt", encode_string_list(&self.dns_opt)),
      ("user", self.user.clone().map(Value::String)),
      ("working_dir", self.working_dir.clone().map(Value::String)),
      ("stop_grace_period", self.stop_grace_period.clone().map(Value::String)),
      ("stop_signal", self.stop_signal.clone().map(Value::String)),
      ("cap_add", encode_string_list(&self.cap_add)),
      ("cap_drop", encode_string_list(&self.cap_drop)),
      ("devices", encode_string_list(&self.devices)),
      ("tmpfs", self.tmpfs.as_ref().map(ScalarOrList::encode)),
      ("profiles", encode_string_list(&self.profiles)),
      ("x-sb-secrets", x_sb_secrets_value),
      ("x-sb-groups", encode_string_list(&self.x_sb_groups)),
    ];
    Value::Mapping(build_mapping(fields, &self.extra))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decodes_minimal_service_and_preserves_unknown_key() {
    let yaml = "image: demo:1\nrestart: always\n";
    let value: Value = serde_yaml_ng::from_str(yaml).unwrap();
    let service = Service::decode(&value).unwrap();
    assert_eq!(service.image.as_deref(), Some("demo:1"));
    assert_eq!(service.extra.get("restart").and_then(Value::as_str), Some("always"));
    let re_encoded = service.encode();
    let Value::Mapping(map) = &re_encoded else { panic!("expected mapping") };
    let keys: Vec<&str> = map.keys().filter_map(|k| k.as_str()).collect();
    assert_eq!(keys, vec!["image", "restart"]);
  }

  #[test]
  fn decodes_x_sb_extensions() {
    let yaml = "image: demo:1\nx-sb-secrets:\n  ConnStr: /run/secrets/conn\nx-sb-groups: [core, edge]\n";
    let value: Value = serde_yaml_ng::from_str(yaml).unwrap();
    let service = Service::decode(&value).unwrap();
    assert_eq!(
      service.x_sb_secrets.get("ConnStr").map(String::as_str),
      Some("/run/secrets/conn")
    );
    assert_eq!(service.x_sb_groups, vec!["core".to_string(), "edge".to_string()]);
  }
}
