pub mod ci_map;
pub mod compose;
pub mod config;
pub mod deploy;
pub mod healthcheck;
pub mod logger;
pub mod logging;
pub mod mount;
pub mod network;
pub mod policy;
pub mod ports;
pub mod secrets_map;
pub mod service;
pub mod union;
pub mod yaml_ext;

pub use ci_map::CaseInsensitiveMap;
pub use compose::ComposeFile;
pub use config::{AppSettingsMode, RenderRequest, SbConfig, SbEnv};
pub use logger::{LogConfig, LogLevel, StdioLogMode};
pub use policy::SecretsPolicy;
pub use secrets_map::SecretsMap;
pub use service::Service;
