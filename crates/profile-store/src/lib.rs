//! Versioned selector profile persistence
//!
//! Profiles are keyed by `(owning_artifact, logical_id)`. Writers go through
//! compare-and-swap on the profile version and every successful swap first
//! retains the replaced version as a backup. Fallback usage reports and
//! healing records are kept as append-only logs per artifact.

pub mod api;
pub mod errors;
pub mod fs;
pub mod fs_store;
pub mod index;
pub mod memory;
pub mod model;
pub mod policy;

pub use api::{ProfileStore, ProfileStoreBuilder, StoreResult};
pub use errors::{StoreErrKind, StoreError};
pub use fs_store::FsProfileStore;
pub use memory::InMemoryProfileStore;
pub use model::{BackupHandle, BackupRecord};
pub use policy::{IoCfg, StoreBackend, StorePolicyView};
