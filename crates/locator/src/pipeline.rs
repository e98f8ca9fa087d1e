//! Build-time pipeline from raw records to profiles

use resel_core_types::{ArtifactId, SelectorProfile};
use tracing::warn;

use crate::builder::{Observation, ProfileBuilder};
use crate::errors::LocatorError;
use crate::policy::LocatorPolicy;
use crate::snapshot::{RawElementRecord, SnapshotNormalizer};
use crate::strategies::CandidateGenerator;
use crate::uniqueness::UniquenessValidator;

/// Outcome for one logical element (or one unusable record).
#[derive(Debug)]
pub struct BuildEntry {
    /// Logical id, or `#<index>` for a record that carried none.
    pub label: String,
    pub result: Result<SelectorProfile, LocatorError>,
}

pub struct BuildPipeline {
    normalizer: SnapshotNormalizer,
    generator: CandidateGenerator,
    validator: UniquenessValidator,
    builder: ProfileBuilder,
}

impl Default for BuildPipeline {
    fn default() -> Self {
        Self::new(&LocatorPolicy::default())
    }
}

impl BuildPipeline {
    pub fn new(policy: &LocatorPolicy) -> Self {
        Self {
            normalizer: SnapshotNormalizer::new(policy.normalizer.clone()),
            generator: CandidateGenerator::new(policy.generator.clone()),
            validator: UniquenessValidator::new(),
            builder: ProfileBuilder::new(policy.builder.clone()),
        }
    }

    pub fn observe(&self, raw: RawElementRecord) -> Result<Observation, LocatorError> {
        let snapshot = self.normalizer.normalize(raw)?;
        Ok(Observation::capture(
            snapshot,
            &self.generator,
            &self.validator,
        ))
    }

    /// Build one profile per logical id found in `records`. Records that fail
    /// normalisation are reported on their own and never abort the batch.
    pub fn run(&self, artifact: &ArtifactId, records: Vec<RawElementRecord>) -> Vec<BuildEntry> {
        let mut entries = Vec::new();
        let mut observations = Vec::with_capacity(records.len());
        for (index, raw) in records.into_iter().enumerate() {
            let label = raw
                .logical_id
                .clone()
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| format!("#{index}"));
            match self.observe(raw) {
                Ok(observation) => observations.push(observation),
                Err(err) => {
                    warn!(record = %label, error = %err, "skipping malformed record");
                    entries.push(BuildEntry {
                        label,
                        result: Err(err),
                    });
                }
            }
        }
        entries.extend(
            self.builder
                .build_batch(artifact, observations)
                .into_iter()
                .map(|(logical_id, result)| BuildEntry {
                    label: logical_id.to_string(),
                    result,
                }),
        );
        entries
    }
}
