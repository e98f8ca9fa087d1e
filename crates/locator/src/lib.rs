//! Resilient element locator
//!
//! Build time: raw element records are normalised into snapshots, turned into
//! ranked selector candidates, checked for uniqueness against the captured
//! tree and folded into a [`SelectorProfile`].
//!
//! Run time: a profile is resolved against a live [`ElementFinder`], trying the
//! primary then each fallback under its own timeout budget, and a
//! [`FallbackUsageReport`] is emitted whenever a fallback had to be used or
//! every strategy failed.

pub mod builder;
pub mod errors;
pub mod pipeline;
pub mod policy;
pub mod resolver;
pub mod snapshot;
pub mod strategies;
pub mod uniqueness;

pub use builder::{Observation, ProfileBuilder};
pub use errors::LocatorError;
pub use pipeline::{BuildEntry, BuildPipeline};
pub use policy::{
    BuilderCfg, GeneratorCfg, LocatorPolicy, NormalizerCfg, ReconcileMode, RuntimeCfg,
};
pub use resolver::{
    AttemptOutcome, AttemptRecord, ElementFinder, ElementHandle, FinderError, ReportSink,
    ResolutionRuntime, ResolutionState, ResolvedElement,
};
pub use snapshot::{
    Attr, AttributeMap, Bounds, ElementSnapshot, NodeDescriptor, PathSegment, RawElementRecord,
    RawNode, RawTree, SnapshotNormalizer, TreeContext,
};
pub use strategies::{base_priority, looks_dynamic, CandidateGenerator};
pub use uniqueness::UniquenessValidator;

pub use resel_core_types::{
    FallbackUsageReport, LogicalId, Platform, SelectorCandidate, SelectorProfile,
    SelectorStrategy, Stability,
};
