//! Logging configuration, grounded in komodo's `lib/logger` (the
//! `StdioLogMode` + `LogLevel` pair matched into a `tracing_subscriber`
//! layer). The OTEL export layer komodo's version has is dropped here —
//! this core has no long-running server to export spans from, so the
//! ambient stack is trimmed to the stdio half (see DESIGN.md).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
  Error,
  Warn,
  Info,
  Debug,
  Trace,
}

impl Default for LogLevel {
  fn default() -> Self {
    Self::Info
  }
}

impl LogLevel {
  pub fn as_filter_str(self) -> &'static str {
    match self {
      Self::Error => "error",
      Self::Warn => "warn",
      Self::Info => "info",
      Self::Debug => "debug",
      Self::Trace => "trace",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StdioLogMode {
  Standard,
  Json,
  None,
}

impl Default for StdioLogMode {
  fn default() -> Self {
    Self::Standard
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
  #[serde(default)]
  pub level: LogLevel,
  #[serde(default)]
  pub mode: StdioLogMode,
  #[serde(default)]
  pub pretty: bool,
}
