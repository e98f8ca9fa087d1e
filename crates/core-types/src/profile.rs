use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use crate::{ArtifactId, LogicalId, Platform, ProfileKey, SelectorStrategy};

/// One locator derived from a snapshot: strategy, rendered value and base priority.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SelectorCandidate {
    pub strategy: SelectorStrategy,
    pub value: String,
    pub base_priority: u8,
    #[cfg_attr(feature = "serde-full", serde(default))]
    pub is_unique: bool,
}

impl SelectorCandidate {
    pub fn new(strategy: SelectorStrategy, value: impl Into<String>, base_priority: u8) -> Self {
        Self {
            strategy,
            value: value.into(),
            base_priority,
            is_unique: false,
        }
    }

    pub fn with_unique(mut self, unique: bool) -> Self {
        self.is_unique = unique;
        self
    }

    /// Ranking order: higher priority first, then strategy declaration order.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .base_priority
            .cmp(&self.base_priority)
            .then_with(|| self.strategy.cmp(&other.strategy))
    }
}

impl fmt::Display for SelectorCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.strategy.name(), self.value)
    }
}

/// Coarse label for how likely the primary selector survives UI changes.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "UPPERCASE"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Stability {
    High,
    Medium,
    Low,
}

impl Stability {
    pub fn from_priority(priority: u8) -> Self {
        match priority {
            90.. => Stability::High,
            60..=89 => Stability::Medium,
            _ => Stability::Low,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stability::High => "HIGH",
            Stability::Medium => "MEDIUM",
            Stability::Low => "LOW",
        }
    }
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The persisted unit: primary plus ordered fallbacks for one logical element.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SelectorProfile {
    pub logical_id: LogicalId,
    pub platform: Platform,
    pub primary: SelectorCandidate,
    #[cfg_attr(feature = "serde-full", serde(default))]
    pub fallbacks: Vec<SelectorCandidate>,
    pub stability: Stability,
    pub version: u64,
    pub owning_artifact: ArtifactId,
}

impl SelectorProfile {
    pub fn key(&self) -> ProfileKey {
        ProfileKey::new(self.owning_artifact.clone(), self.logical_id.clone())
    }

    /// Primary first, then fallbacks in order; index 0 is the primary.
    pub fn attempt_chain(&self) -> impl Iterator<Item = &SelectorCandidate> {
        std::iter::once(&self.primary).chain(self.fallbacks.iter())
    }

    pub fn candidate_at(&self, index: usize) -> Option<&SelectorCandidate> {
        self.attempt_chain().nth(index)
    }

    pub fn position_of(&self, strategy: SelectorStrategy) -> Option<usize> {
        self.attempt_chain()
            .position(|candidate| candidate.strategy == strategy)
    }

    pub fn contains_strategy(&self, strategy: SelectorStrategy) -> bool {
        self.position_of(strategy).is_some()
    }

    pub fn attempt_count(&self) -> usize {
        1 + self.fallbacks.len()
    }

    /// Recompute stability from the current primary.
    pub fn refresh_stability(&mut self) {
        self.stability = Stability::from_priority(self.primary.base_priority);
    }

    /// Every entry unique at build time and strategies pairwise distinct.
    pub fn is_well_formed(&self) -> bool {
        let mut seen = HashSet::new();
        self.attempt_chain()
            .all(|candidate| candidate.is_unique && seen.insert(candidate.strategy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(strategy: SelectorStrategy, priority: u8) -> SelectorCandidate {
        SelectorCandidate::new(strategy, "v", priority).with_unique(true)
    }

    #[test]
    fn stability_thresholds() {
        assert_eq!(Stability::from_priority(95), Stability::High);
        assert_eq!(Stability::from_priority(90), Stability::High);
        assert_eq!(Stability::from_priority(89), Stability::Medium);
        assert_eq!(Stability::from_priority(60), Stability::Medium);
        assert_eq!(Stability::from_priority(59), Stability::Low);
    }

    #[test]
    fn rank_prefers_priority_then_declaration_order() {
        let mut list = vec![
            candidate(SelectorStrategy::VisibleTextContains, 75),
            candidate(SelectorStrategy::CssById, 90),
            candidate(SelectorStrategy::NameAttribute, 75),
        ];
        list.sort_by(SelectorCandidate::rank_cmp);
        let order: Vec<_> = list.iter().map(|c| c.strategy).collect();
        assert_eq!(
            order,
            vec![
                SelectorStrategy::CssById,
                SelectorStrategy::NameAttribute,
                SelectorStrategy::VisibleTextContains
            ]
        );
    }

    #[test]
    fn well_formed_rejects_duplicate_strategies() {
        let profile = SelectorProfile {
            logical_id: "a".into(),
            platform: Platform::Android,
            primary: candidate(SelectorStrategy::ExactId, 95),
            fallbacks: vec![candidate(SelectorStrategy::ExactId, 95)],
            stability: Stability::High,
            version: 1,
            owning_artifact: "t".into(),
        };
        assert!(!profile.is_well_formed());
        assert_eq!(profile.position_of(SelectorStrategy::ExactId), Some(0));
        assert_eq!(profile.attempt_count(), 2);
    }
}
