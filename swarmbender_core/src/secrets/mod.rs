//! The Secret Provider Hub and Secrets Lifecycle Engine (spec.md §4.5,
//! §4.6).

pub mod hub;
pub mod lifecycle;
pub mod map_writer;
pub mod naming;
pub mod provider;
pub mod sync;
pub mod versioning;

pub use hub::{KeyPipeline, ProviderHub, ReplaceRule};
pub use lifecycle::{
  build_labels, doctor, ensure_created_batch, prune, rotate, DoctorReport, EnsureCreatedReport, MultiVersionGroup, PruneReport,
  RotateReport, RotationInput,
};
pub use map_writer::{read_secrets_map, write_secrets_map};
pub use naming::{synthesize_name, Scope};
pub use provider::{EnvProvider, FileProvider, Provider};
pub use sync::{sync, SyncOutcome, SyncRequest};
pub use versioning::{suffix, VersioningInput};
