//! Logging initialization, grounded in komodo's `lib/logger/src/lib.rs`:
//! a `tracing_subscriber::Registry` with an env-driven level filter,
//! switched over `(StdioLogMode, pretty)`. komodo's version also
//! branches over an OTEL layer; this core has no long-running server to
//! export spans from, so that branch is dropped (see DESIGN.md).

use swarmbender_client::entities::{LogConfig, StdioLogMode};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Initializes the global `tracing` subscriber from `config`. Safe to
/// call once per process; a second call returns an error from
/// `try_init`, which callers should treat as non-fatal (the host binary
/// may have already installed its own subscriber).
pub fn init(config: &LogConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.as_filter_str()));
  let registry = Registry::default().with(filter);

  match (config.mode, config.pretty) {
    (StdioLogMode::Standard, true) => registry
      .with(tracing_subscriber::fmt::layer().pretty().with_file(false).with_line_number(false))
      .try_init(),
    (StdioLogMode::Standard, false) => registry.with(tracing_subscriber::fmt::layer().with_target(true)).try_init(),
    (StdioLogMode::Json, _) => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
    (StdioLogMode::None, _) => Ok(()),
  }
}
