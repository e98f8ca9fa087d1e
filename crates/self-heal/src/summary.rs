//! Operator-facing usage summary derived from the report and audit logs

use std::collections::{BTreeMap, BTreeSet};

use resel_core_types::{ArtifactId, FallbackUsageReport, HealingRecord, Platform, ProfileKey};
use resel_profile_store::ProfileStore;
use serde::Serialize;

use crate::errors::HealError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PlatformSummary {
    pub fallback_usages: usize,
    pub failures: usize,
    pub elements_affected: usize,
    pub promotions: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OperatorSummary {
    pub total_fallback_usages: usize,
    pub total_failures: usize,
    pub unique_elements: usize,
    pub promotions_applied: usize,
    pub by_platform: BTreeMap<Platform, PlatformSummary>,
}

impl OperatorSummary {
    pub fn from_logs(reports: &[FallbackUsageReport], records: &[HealingRecord]) -> Self {
        let mut summary = OperatorSummary::default();
        let mut affected: BTreeMap<Platform, BTreeSet<ProfileKey>> = BTreeMap::new();

        for report in reports {
            let usage = report.fallback_strategy().is_some();
            let failure = report.is_failure();
            if !usage && !failure {
                continue;
            }
            let entry = summary.by_platform.entry(report.platform).or_default();
            if usage {
                entry.fallback_usages += 1;
                summary.total_fallback_usages += 1;
            } else {
                entry.failures += 1;
                summary.total_failures += 1;
            }
            affected
                .entry(report.platform)
                .or_default()
                .insert(report.key());
        }

        for record in records {
            summary
                .by_platform
                .entry(record.platform)
                .or_default()
                .promotions += 1;
            summary.promotions_applied += 1;
        }

        let mut unique = BTreeSet::new();
        for (platform, keys) in affected {
            if let Some(entry) = summary.by_platform.get_mut(&platform) {
                entry.elements_affected = keys.len();
            }
            unique.extend(keys);
        }
        summary.unique_elements = unique.len();
        summary
    }

    /// Scan the store's logs, optionally for one artifact.
    pub async fn collect(
        store: &dyn ProfileStore,
        artifact: Option<&ArtifactId>,
    ) -> Result<Self, HealError> {
        let reports = store.reports(artifact).await?;
        let records = store.healing_records(artifact).await?;
        Ok(Self::from_logs(&reports, &records))
    }
}
