use indexmap::IndexMap;
use serde_yaml_ng::Value;

use super::yaml_ext::{build_mapping, split_mapping, Extra};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logging {
  pub driver: Option<String>,
  pub options: IndexMap<String, String>,
  pub extra: Extra,
}

const KNOWN_KEYS: &[&str] = &["driver", "options"];

impl Logging {
  pub fn decode(value: &Value) -> Result<Self, String> {
    let Value::Mapping(map) = value else {
      return Err(format!("logging must be a mapping, found {value:?}"));
    };
    let (known, extra) = split_mapping(map.clone(), KNOWN_KEYS);
    let driver = known.get("driver").and_then(Value::as_str).map(str::to_string);
    let mut options = IndexMap::new();
    if let Some(Value::Mapping(opts)) = known.get("options") {
      for (k, v) in opts {
        if let (Some(k), Some(v)) = (k.as_str(), super::yaml_ext::scalar_to_string(v)) {
          options.insert(k.to_string(), v);
        }
      }
    }
    Ok(Self { driver, options, extra })
  }

  pub fn encode(&self) -> Value {
    let options_value = (!self.options.is_empty()).then(|| {
      let mut map = serde_yaml_ng::Mapping::new();
      for (k, v) in &self.options {
        map.insert(Value::String(k.clone()), Value::String(v.clone()));
      }
      Value::Mapping(map)
    });
    let fields = vec![
      ("driver", self.driver.clone().map(Value::String)),
      ("options", options_value),
    ];
    Value::Mapping(build_mapping(fields, &self.extra))
  }
}
