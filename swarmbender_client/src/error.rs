use std::path::PathBuf;

use thiserror::Error;

/// The error taxonomy shared across the render pipeline and the secrets
/// lifecycle engine. Call sites wrap these in `anyhow::Error` with
/// `.context(...)` for user-facing messages; the variants here exist so
/// callers that need to branch on *kind* (the orchestrator deciding
/// whether a stage error is fatal, the secrets engine deciding whether a
/// provider failure is isolated) can match on a stable shape.
#[derive(Error, Debug)]
pub enum SbError {
  #[error("config error: {0}")]
  Config(#[from] ConfigError),

  #[error("malformed document at {path}{}: {reason}", offset_suffix(*offset))]
  MalformedDocument {
    path: PathBuf,
    offset: Option<usize>,
    reason: String,
  },

  #[error("schema violation in {path}: {reason}")]
  SchemaViolation { path: PathBuf, reason: String },

  #[error("overlay error in {path}: {cause}")]
  Overlay { path: PathBuf, cause: String },

  #[error("unresolved token ${{{name}}} at {location}")]
  UnresolvedToken { name: String, location: String },

  #[error("provider '{provider}' failed: {cause}")]
  Provider { provider: String, cause: String },

  #[error("engine op '{op}' failed: {cause}")]
  Engine { op: String, cause: String },

  #[error("operation '{op}' timed out")]
  Timeout { op: String },

  #[error("failed to persist secrets map: {0}")]
  MapWrite(String),

  #[error("stage '{stage}' failed: {cause}")]
  Pipeline {
    stage: &'static str,
    #[source]
    cause: anyhow::Error,
  },
}

fn offset_suffix(offset: Option<usize>) -> String {
  match offset {
    Some(o) => format!(" (byte {o})"),
    None => String::new(),
  }
}

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("could not read config file at {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("could not parse config file at {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_yaml_ng::Error,
  },
  #[error("missing required config value: {0}")]
  Missing(String),
}

impl SbError {
  pub fn pipeline(stage: &'static str, cause: impl Into<anyhow::Error>) -> Self {
    SbError::Pipeline {
      stage,
      cause: cause.into(),
    }
  }

  /// Whether this kind of failure is recoverable by isolating the one
  /// provider/name that failed rather than aborting the whole operation.
  /// See spec.md §7: provider aggregation isolates individual failures;
  /// engine create/remove do not.
  pub fn is_isolable_provider_failure(&self) -> bool {
    matches!(self, SbError::Provider { .. } | SbError::Timeout { .. })
  }
}
