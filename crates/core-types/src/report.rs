use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{ArtifactId, LogicalId, Platform, ProfileKey, SelectorStrategy};

/// Emitted by the resolution runtime when a non-primary strategy resolved
/// the element or when every strategy failed.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct FallbackUsageReport {
    pub report_id: Uuid,
    pub logical_id: LogicalId,
    pub owning_artifact: ArtifactId,
    pub platform: Platform,
    /// Strategy that did not resolve; `None` when the primary succeeded.
    pub failed_strategy: Option<SelectorStrategy>,
    pub succeeded_strategy: Option<SelectorStrategy>,
    /// Index in the attempt chain (0 = primary); `None` on total failure.
    pub succeeded_index: Option<usize>,
    /// Profile version the resolution ran against.
    pub profile_version: u64,
    pub timestamp: DateTime<Utc>,
}

impl FallbackUsageReport {
    pub fn key(&self) -> ProfileKey {
        ProfileKey::new(self.owning_artifact.clone(), self.logical_id.clone())
    }

    pub fn is_failure(&self) -> bool {
        self.succeeded_index.is_none()
    }

    pub fn is_primary_success(&self) -> bool {
        self.succeeded_index == Some(0)
    }

    /// Strategy of a successful non-primary resolution.
    pub fn fallback_strategy(&self) -> Option<SelectorStrategy> {
        match self.succeeded_index {
            Some(index) if index > 0 => self.succeeded_strategy,
            _ => None,
        }
    }
}

/// Immutable audit entry written once per promotion.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct HealingRecord {
    pub record_id: Uuid,
    pub logical_id: LogicalId,
    pub owning_artifact: ArtifactId,
    pub platform: Platform,
    pub old_profile_version: u64,
    pub new_profile_version: u64,
    pub promoted_strategy: SelectorStrategy,
    pub demoted_strategy: SelectorStrategy,
    pub backup_path: String,
    pub timestamp: DateTime<Utc>,
}

impl HealingRecord {
    pub fn key(&self) -> ProfileKey {
        ProfileKey::new(self.owning_artifact.clone(), self.logical_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(index: Option<usize>) -> FallbackUsageReport {
        FallbackUsageReport {
            report_id: Uuid::new_v4(),
            logical_id: "btn".into(),
            owning_artifact: "suite".into(),
            platform: Platform::Web,
            failed_strategy: Some(SelectorStrategy::XpathById),
            succeeded_strategy: index.map(|_| SelectorStrategy::CssById),
            succeeded_index: index,
            profile_version: 1,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn classifies_report_shapes() {
        assert!(report(None).is_failure());
        assert!(report(Some(0)).is_primary_success());
        assert_eq!(report(Some(0)).fallback_strategy(), None);
        assert_eq!(
            report(Some(2)).fallback_strategy(),
            Some(SelectorStrategy::CssById)
        );
        assert_eq!(report(None).fallback_strategy(), None);
    }
}
