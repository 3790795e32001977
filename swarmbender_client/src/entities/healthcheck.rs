use serde_yaml_ng::Value;

use super::union::ScalarOrList;
use super::yaml_ext::{build_mapping, split_mapping, Extra};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Healthcheck {
  pub test: Option<ScalarOrList>,
  pub interval: Option<String>,
  pub timeout: Option<String>,
  pub retries: Option<i64>,
  pub start_period: Option<String>,
  pub disable: Option<bool>,
  pub extra: Extra,
}

const KNOWN_KEYS: &[&str] = &["test", "interval", "timeout", "retries", "start_period", "disable"];

impl Healthcheck {
  pub fn decode(value: &Value) -> Result<Self, String> {
    let Value::Mapping(map) = value else {
      return Err(format!("healthcheck must be a mapping, found {value:?}"));
    };
    let (known, extra) = split_mapping(map.clone(), KNOWN_KEYS);
    let test = known
      .get("test")
      .map(|v| ScalarOrList::decode("healthcheck.test", v))
      .transpose()
      .map_err(|e| e.to_string())?;
    Ok(Self {
      test,
      interval: known.get("interval").and_then(Value::as_str).map(str::to_string),
      timeout: known.get("timeout").and_then(Value::as_str).map(str::to_string),
      retries: known.get("retries").and_then(Value::as_i64),
      start_period: known.get("start_period").and_then(Value::as_str).map(str::to_string),
      disable: known.get("disable").and_then(Value::as_bool),
      extra,
    })
  }

  /// Emitted with `test` in flow sequence style per spec.md §4.1; the
  /// flow-vs-block distinction is applied as a post-process on the
  /// serialized text (see `orchestrator::stages::serialize`), since the
  /// Mapping/Value tree has no per-node style flag to set here.
  pub fn encode(&self) -> Value {
    let fields = vec![
      ("test", self.test.as_ref().map(ScalarOrList::encode)),
      ("interval", self.interval.clone().map(Value::String)),
      ("timeout", self.timeout.clone().map(Value::String)),
      ("retries", self.retries.map(|r| Value::Number(r.into()))),
      ("start_period", self.start_period.clone().map(Value::String)),
      ("disable", self.disable.map(Value::Bool)),
    ];
    Value::Mapping(build_mapping(fields, &self.extra))
  }
}
