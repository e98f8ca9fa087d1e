//! Self-healing for selector profiles
//!
//! Consumes fallback usage reports from the resolution runtime, counts
//! successful non-primary resolutions per element and strategy, and promotes
//! a fallback to primary through the profile store's compare-and-swap once
//! the configured threshold is reached.

pub mod engine;
pub mod errors;
pub mod policy;
pub mod promote;
pub mod summary;

pub use engine::{HealingEngine, HealingHandle};
pub use errors::HealError;
pub use policy::HealPolicy;
pub use promote::promote;
pub use summary::{OperatorSummary, PlatformSummary};
