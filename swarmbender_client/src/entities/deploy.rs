use indexmap::IndexMap;
use serde_yaml_ng::Value;

use super::union::ListOrMap;
use super::yaml_ext::{build_mapping, scalar_to_string, split_mapping, Extra};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceSpec {
  pub cpus: Option<String>,
  pub memory: Option<String>,
  pub extra: Extra,
}

impl ResourceSpec {
  fn decode(value: &Value) -> Result<Self, String> {
    let Value::Mapping(map) = value else {
      return Err(format!("resource spec must be a mapping, found {value:?}"));
    };
    let (known, extra) = split_mapping(map.clone(), &["cpus", "memory"]);
    Ok(Self {
      cpus: known.get("cpus").and_then(scalar_to_string),
      memory: known.get("memory").and_then(Value::as_str).map(str::to_string),
      extra,
    })
  }

  fn encode(&self) -> Value {
    let fields = vec![
      ("cpus", self.cpus.clone().map(Value::String)),
      ("memory", self.memory.clone().map(Value::String)),
    ];
    Value::Mapping(build_mapping(fields, &self.extra))
  }

  fn is_empty(&self) -> bool {
    self.cpus.is_none() && self.memory.is_none() && self.extra.is_empty()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resources {
  pub limits: Option<ResourceSpec>,
  pub reservations: Option<ResourceSpec>,
  pub extra: Extra,
}

impl Resources {
  fn decode(value: &Value) -> Result<Self, String> {
    let Value::Mapping(map) = value else {
      return Err(format!("resources must be a mapping, found {value:?}"));
    };
    let (known, extra) = split_mapping(map.clone(), &["limits", "reservations"]);
    let limits = known.get("limits").map(ResourceSpec::decode).transpose()?;
    let reservations = known.get("reservations").map(ResourceSpec::decode).transpose()?;
    Ok(Self {
      limits,
      reservations,
      extra,
    })
  }

  fn encode(&self) -> Value {
    let fields = vec![
      ("limits", self.limits.as_ref().filter(|r| !r.is_empty()).map(ResourceSpec::encode)),
      (
        "reservations",
        self.reservations.as_ref().filter(|r| !r.is_empty()).map(ResourceSpec::encode),
      ),
    ];
    Value::Mapping(build_mapping(fields, &self.extra))
  }

  fn is_empty(&self) -> bool {
    self.limits.is_none() && self.reservations.is_none() && self.extra.is_empty()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestartPolicy {
  pub condition: Option<String>,
  pub delay: Option<String>,
  pub max_attempts: Option<i64>,
  pub window: Option<String>,
  pub extra: Extra,
}

impl RestartPolicy {
  fn decode(value: &Value) -> Result<Self, String> {
    let Value::Mapping(map) = value else {
      return Err(format!("restart_policy must be a mapping, found {value:?}"));
    };
    let (known, extra) = split_mapping(map.clone(), &["condition", "delay", "max_attempts", "window"]);
    Ok(Self {
      condition: known.get("condition").and_then(Value::as_str).map(str::to_string),
      delay: known.get("delay").and_then(Value::as_str).map(str::to_string),
      max_attempts: known.get("max_attempts").and_then(Value::as_i64),
      window: known.get("window").and_then(Value::as_str).map(str::to_string),
      extra,
    })
  }

  fn encode(&self) -> Value {
    let fields = vec![
      ("condition", self.condition.clone().map(Value::String)),
      ("delay", self.delay.clone().map(Value::String)),
      ("max_attempts", self.max_attempts.map(|v| Value::Number(v.into()))),
      ("window", self.window.clone().map(Value::String)),
    ];
    Value::Mapping(build_mapping(fields, &self.extra))
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateConfig {
  pub parallelism: Option<i64>,
  pub delay: Option<String>,
  pub failure_action: Option<String>,
  pub monitor: Option<String>,
  pub max_failure_ratio: Option<String>,
  pub order: Option<String>,
  pub extra: Extra,
}

const UPDATE_KEYS: &[&str] = &[
  "parallelism",
  "delay",
  "failure_action",
  "monitor",
  "max_failure_ratio",
  "order",
];

impl UpdateConfig {
  fn decode(value: &Value) -> Result<Self, String> {
    let Value::Mapping(map) = value else {
      return Err(format!("update_config must be a mapping, found {value:?}"));
    };
    let (known, extra) = split_mapping(map.clone(), UPDATE_KEYS);
    Ok(Self {
      parallelism: known.get("parallelism").and_then(Value::as_i64),
      delay: known.get("delay").and_then(Value::as_str).map(str::to_string),
      failure_action: known.get("failure_action").and_then(Value::as_str).map(str::to_string),
      monitor: known.get("monitor").and_then(Value::as_str).map(str::to_string),
      max_failure_ratio: known.get("max_failure_ratio").and_then(scalar_to_string),
      order: known.get("order").and_then(Value::as_str).map(str::to_string),
      extra,
    })
  }

  fn encode(&self) -> Value {
    let fields = vec![
      ("parallelism", self.parallelism.map(|v| Value::Number(v.into()))),
      ("delay", self.delay.clone().map(Value::String)),
      ("failure_action", self.failure_action.clone().map(Value::String)),
      ("monitor", self.monitor.clone().map(Value::String)),
      ("max_failure_ratio", self.max_failure_ratio.clone().map(Value::String)),
      ("order", self.order.clone().map(Value::String)),
    ];
    Value::Mapping(build_mapping(fields, &self.extra))
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placement {
  pub constraints: Vec<String>,
  pub preferences: Vec<IndexMap<String, Value>>,
  pub max_replicas_per_node: Option<i64>,
  pub extra: Extra,
}

impl Placement {
  fn decode(value: &Value) -> Result<Self, String> {
    let Value::Mapping(map) = value else {
      return Err(format!("placement must be a mapping, found {value:?}"));
    };
    let (known, extra) = split_mapping(map.clone(), &["constraints", "preferences", "max_replicas_per_node"]);
    let constraints = match known.get("constraints") {
      Some(Value::Sequence(seq)) => seq.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
      _ => Vec::new(),
    };
    let preferences = match known.get("preferences") {
      Some(Value::Sequence(seq)) => seq
        .iter()
        .filter_map(|v| match v {
          Value::Mapping(m) => Some(
            m.iter()
              .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v.clone())))
              .collect(),
          ),
          _ => None,
        })
        .collect(),
      _ => Vec::new(),
    };
    Ok(Self {
      constraints,
      preferences,
      max_replicas_per_node: known.get("max_replicas_per_node").and_then(Value::as_i64),
      extra,
    })
  }

  fn encode(&self) -> Value {
    let constraints = (!self.constraints.is_empty())
      .then(|| Value::Sequence(self.constraints.iter().cloned().map(Value::String).collect()));
    let preferences = (!self.preferences.is_empty()).then(|| {
      Value::Sequence(
        self
          .preferences
          .iter()
          .map(|pref| {
            let mut map = serde_yaml_ng::Mapping::new();
            for (k, v) in pref {
              map.insert(Value::String(k.clone()), v.clone());
            }
            Value::Mapping(map)
          })
          .collect(),
      )
    });
    let fields = vec![
      ("constraints", constraints),
      ("preferences", preferences),
      (
        "max_replicas_per_node",
        self.max_replicas_per_node.map(|v| Value::Number(v.into())),
      ),
    ];
    Value::Mapping(build_mapping(fields, &self.extra))
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deploy {
  pub mode: Option<String>,
  pub replicas: Option<i64>,
  pub resources: Option<Resources>,
  pub restart_policy: Option<RestartPolicy>,
  pub update_config: Option<UpdateConfig>,
  pub rollback_config: Option<UpdateConfig>,
  pub placement: Option<Placement>,
  pub labels: Option<ListOrMap>,
  pub endpoint_mode: Option<String>,
  pub extra: Extra,
}

const KNOWN_KEYS: &[&str] = &[
  "mode",
  "replicas",
  "resources",
  "restart_policy",
  "update_config",
  "rollback_config",
  "placement",
  "labels",
  "endpoint_mode",
];

impl Deploy {
  pub fn decode(value: &Value) -> Result<Self, String> {
    let Value::Mapping(map) = value else {
      return Err(format!("deploy must be a mapping, found {value:?}"));
    };
    let (known, extra) = split_mapping(map.clone(), KNOWN_KEYS);
    let resources = known.get("resources").map(Resources::decode).transpose()?;
    let restart_policy = known.get("restart_policy").map(RestartPolicy::decode).transpose()?;
    let update_config = known.get("update_config").map(UpdateConfig::decode).transpose()?;
    let rollback_config = known.get("rollback_config").map(UpdateConfig::decode).transpose()?;
    let placement = known.get("placement").map(Placement::decode).transpose()?;
    let labels = known
      .get("labels")
      .map(|v| ListOrMap::decode("deploy.labels", v))
      .transpose()
      .map_err(|e| e.to_string())?;
    Ok(Self {
      mode: known.get("mode").and_then(Value::as_str).map(str::to_string),
      replicas: known.get("replicas").and_then(Value::as_i64),
      resources,
      restart_policy,
      update_config,
      rollback_config,
      placement,
      labels,
      endpoint_mode: known.get("endpoint_mode").and_then(Value::as_str).map(str::to_string),
      extra,
    })
  }

  pub fn encode(&self) -> Value {
    let fields = vec![
      ("mode", self.mode.clone().map(Value::String)),
      ("replicas", self.replicas.map(|v| Value::Number(v.into()))),
      (
        "resources",
        self.resources.as_ref().filter(|r| !r.is_empty()).map(Resources::encode),
      ),
      ("restart_policy", self.restart_policy.as_ref().map(RestartPolicy::encode)),
      ("update_config", self.update_config.as_ref().map(UpdateConfig::encode)),
      (
        "rollback_config",
        self.rollback_config.as_ref().map(UpdateConfig::encode),
      ),
      ("placement", self.placement.as_ref().map(Placement::encode)),
      ("labels", self.labels.as_ref().map(ListOrMap::encode)),
      ("endpoint_mode", self.endpoint_mode.clone().map(Value::String)),
    ];
    Value::Mapping(build_mapping(fields, &self.extra))
  }
}
