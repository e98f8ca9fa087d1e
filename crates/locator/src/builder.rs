//! Profile building
//!
//! Folds one or more validated observations of the same logical element into
//! a [`SelectorProfile`]. Strategies are reconciled across observations
//! according to [`ReconcileMode`]; survivors are ranked by base priority with
//! strategy declaration order as the tie-breaker.

use std::collections::{BTreeMap, HashSet};

use resel_core_types::{
    ArtifactId, LogicalId, Platform, SelectorCandidate, SelectorProfile, SelectorStrategy,
    Stability,
};
use tracing::{debug, info, warn};

use crate::errors::LocatorError;
use crate::policy::{BuilderCfg, ReconcileMode};
use crate::snapshot::ElementSnapshot;
use crate::strategies::CandidateGenerator;
use crate::uniqueness::UniquenessValidator;

/// One capture of an element plus its validated candidates.
#[derive(Clone, Debug)]
pub struct Observation {
    pub snapshot: ElementSnapshot,
    pub candidates: Vec<SelectorCandidate>,
}

impl Observation {
    pub fn new(snapshot: ElementSnapshot, candidates: Vec<SelectorCandidate>) -> Self {
        Self {
            snapshot,
            candidates,
        }
    }

    /// Generate and validate candidates for a snapshot.
    pub fn capture(
        snapshot: ElementSnapshot,
        generator: &CandidateGenerator,
        validator: &UniquenessValidator,
    ) -> Self {
        let candidates = validator.validate(&snapshot, generator.generate(&snapshot));
        Self::new(snapshot, candidates)
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.snapshot.logical_id
    }
}

#[derive(Debug, Default)]
struct StrategyTally {
    present: usize,
    unique: usize,
    priority: u8,
    values: Vec<ValueTally>,
}

#[derive(Debug)]
struct ValueTally {
    value: String,
    hits: usize,
    last_seen: usize,
}

impl StrategyTally {
    fn record(&mut self, candidate: &SelectorCandidate, observation: usize) {
        self.present += 1;
        self.priority = self.priority.max(candidate.base_priority);
        if !candidate.is_unique {
            return;
        }
        self.unique += 1;
        match self
            .values
            .iter_mut()
            .find(|tally| tally.value == candidate.value)
        {
            Some(tally) => {
                tally.hits += 1;
                tally.last_seen = observation;
            }
            None => self.values.push(ValueTally {
                value: candidate.value.clone(),
                hits: 1,
                last_seen: observation,
            }),
        }
    }

    /// Most frequent unique value, latest observation wins ties.
    fn preferred_value(&self) -> Option<&str> {
        self.values
            .iter()
            .max_by_key(|tally| (tally.hits, tally.last_seen))
            .map(|tally| tally.value.as_str())
    }
}

pub struct ProfileBuilder {
    cfg: BuilderCfg,
}

impl Default for ProfileBuilder {
    fn default() -> Self {
        Self::new(BuilderCfg::default())
    }
}

impl ProfileBuilder {
    pub fn new(cfg: BuilderCfg) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &BuilderCfg {
        &self.cfg
    }

    /// Build the initial (version 1) profile for one logical element.
    pub fn build(
        &self,
        artifact: &ArtifactId,
        observations: &[Observation],
    ) -> Result<SelectorProfile, LocatorError> {
        let (logical_id, platform) = Self::identity(observations)?;

        let mut tallies: BTreeMap<SelectorStrategy, StrategyTally> = BTreeMap::new();
        for (index, observation) in observations.iter().enumerate() {
            let mut seen: HashSet<SelectorStrategy> = HashSet::new();
            for candidate in &observation.candidates {
                // identical captures collapse to one occurrence per observation
                if !seen.insert(candidate.strategy) {
                    continue;
                }
                tallies
                    .entry(candidate.strategy)
                    .or_default()
                    .record(candidate, index);
            }
        }

        let mut eligible: Vec<SelectorCandidate> = tallies
            .iter()
            .filter(|(strategy, tally)| {
                let keep = self.is_eligible(tally);
                if !keep && tally.unique > 0 {
                    debug!(
                        logical_id = %logical_id,
                        strategy = strategy.name(),
                        present = tally.present,
                        unique = tally.unique,
                        "strategy unstable across observations"
                    );
                }
                keep
            })
            .filter_map(|(strategy, tally)| {
                let value = tally.preferred_value()?;
                Some(SelectorCandidate::new(*strategy, value, tally.priority).with_unique(true))
            })
            .collect();

        eligible.sort_by(SelectorCandidate::rank_cmp);
        let mut ranked = eligible.into_iter();
        let primary = ranked.next().ok_or_else(|| LocatorError::NoUniqueSelector {
            logical_id: logical_id.clone(),
        })?;
        let fallbacks: Vec<SelectorCandidate> = ranked.take(self.cfg.max_fallbacks).collect();
        let stability = Stability::from_priority(primary.base_priority);

        info!(
            logical_id = %logical_id,
            artifact = %artifact,
            primary = primary.strategy.name(),
            fallbacks = fallbacks.len(),
            stability = stability.name(),
            observations = observations.len(),
            "built selector profile"
        );

        Ok(SelectorProfile {
            logical_id,
            platform,
            primary,
            fallbacks,
            stability,
            version: 1,
            owning_artifact: artifact.clone(),
        })
    }

    /// Group observations by logical id and build each profile independently.
    pub fn build_batch(
        &self,
        artifact: &ArtifactId,
        observations: Vec<Observation>,
    ) -> Vec<(LogicalId, Result<SelectorProfile, LocatorError>)> {
        let mut groups: BTreeMap<LogicalId, Vec<Observation>> = BTreeMap::new();
        for observation in observations {
            groups
                .entry(observation.logical_id().clone())
                .or_default()
                .push(observation);
        }
        groups
            .into_iter()
            .map(|(logical_id, group)| {
                let result = self.build(artifact, &group);
                if let Err(err) = &result {
                    warn!(logical_id = %logical_id, error = %err, "profile build failed");
                }
                (logical_id, result)
            })
            .collect()
    }

    fn is_eligible(&self, tally: &StrategyTally) -> bool {
        if tally.unique == 0 {
            return false;
        }
        match self.cfg.reconcile {
            ReconcileMode::UniqueInEvery => tally.unique == tally.present,
            ReconcileMode::UniqueInMajority => tally.unique * 2 > tally.present,
        }
    }

    fn identity(observations: &[Observation]) -> Result<(LogicalId, Platform), LocatorError> {
        let first = observations.first().ok_or_else(|| {
            LocatorError::MalformedInput("profile build needs at least one observation".into())
        })?;
        let logical_id = first.snapshot.logical_id.clone();
        let platform = first.snapshot.platform;
        for observation in &observations[1..] {
            if observation.snapshot.logical_id != logical_id {
                return Err(LocatorError::MalformedInput(format!(
                    "observation for '{}' mixed into build of '{}'",
                    observation.snapshot.logical_id, logical_id
                )));
            }
            if observation.snapshot.platform != platform {
                return Err(LocatorError::MalformedInput(format!(
                    "element '{}' observed on both {} and {}",
                    logical_id, platform, observation.snapshot.platform
                )));
            }
        }
        Ok((logical_id, platform))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::fixtures::{node, snapshot};
    use crate::snapshot::RawNode;

    fn observe(logical_id: &str, platform: Platform, nodes: Vec<RawNode>, target: usize) -> Observation {
        Observation::capture(
            snapshot(logical_id, platform, nodes, target),
            &CandidateGenerator::default(),
            &UniquenessValidator::new(),
        )
    }

    fn artifact() -> ArtifactId {
        ArtifactId::new("login_test")
    }

    #[test]
    fn id_beats_text_on_flat_capture() {
        let obs = observe(
            "login_button",
            Platform::Android,
            vec![
                node(None, &[("resource-id", "login_button"), ("text", "Log In")]),
                node(None, &[("resource-id", "signup"), ("text", "Sign Up")]),
            ],
            0,
        );
        let profile = ProfileBuilder::default().build(&artifact(), &[obs]).unwrap();
        assert_eq!(profile.primary.strategy, SelectorStrategy::ExactId);
        assert_eq!(profile.primary.value, "login_button");
        assert_eq!(profile.fallbacks.len(), 1);
        assert_eq!(profile.fallbacks[0].strategy, SelectorStrategy::VisibleText);
        assert_eq!(profile.stability, Stability::High);
        assert_eq!(profile.version, 1);
        assert!(profile.is_well_formed());
    }

    #[test]
    fn ambiguous_text_falls_back_to_structure() {
        let nodes = vec![
            node(None, &[("class", "Frame")]),
            node(Some(0), &[("class", "Form")]),
            node(Some(1), &[("class", "Button"), ("text", "Submit")]),
            node(Some(0), &[("class", "Dialog")]),
            node(Some(3), &[("class", "Button"), ("text", "Submit")]),
        ];
        let obs = observe("submit", Platform::Android, nodes, 2);
        let profile = ProfileBuilder::default().build(&artifact(), &[obs]).unwrap();
        assert_eq!(profile.primary.strategy, SelectorStrategy::StructuralPath);
        assert_eq!(profile.primary.value, "/Frame/Form/Button");
        assert!(!profile.contains_strategy(SelectorStrategy::VisibleText));
        assert_eq!(profile.stability, Stability::Medium);
        assert_eq!(profile.fallbacks[0].strategy, SelectorStrategy::IndexedPath);
    }

    #[test]
    fn strategy_must_be_unique_in_every_observation() {
        let unique_text = observe(
            "save",
            Platform::Ios,
            vec![
                node(None, &[("type", "Window")]),
                node(Some(0), &[("type", "Button"), ("value", "Save")]),
            ],
            1,
        );
        let ambiguous_text = observe(
            "save",
            Platform::Ios,
            vec![
                node(None, &[("type", "Window")]),
                node(Some(0), &[("type", "Button"), ("value", "Save")]),
                node(Some(0), &[("type", "Cell"), ("value", "Save")]),
            ],
            1,
        );
        let observations = vec![unique_text, ambiguous_text];

        let strict = ProfileBuilder::default()
            .build(&artifact(), &observations)
            .unwrap();
        assert!(!strict.contains_strategy(SelectorStrategy::VisibleText));
        assert!(strict
            .attempt_chain()
            .all(|candidate| candidate.is_unique));

        let lenient = ProfileBuilder::new(BuilderCfg {
            reconcile: ReconcileMode::UniqueInMajority,
            ..BuilderCfg::default()
        })
        .build(&artifact(), &observations)
        .unwrap();
        assert!(!lenient.contains_strategy(SelectorStrategy::VisibleText));
    }

    #[test]
    fn most_frequent_value_wins() {
        let capture = |text: &str| {
            observe(
                "title",
                Platform::Android,
                vec![node(None, &[("class", "Text"), ("text", text)])],
                0,
            )
        };
        let observations = vec![capture("Inbox"), capture("Inbox"), capture("Inbox (3)")];
        let profile = ProfileBuilder::default()
            .build(&artifact(), &observations)
            .unwrap();
        assert_eq!(profile.primary.strategy, SelectorStrategy::VisibleText);
        assert_eq!(profile.primary.value, "Inbox");
    }

    #[test]
    fn fallbacks_are_capped_and_distinct() {
        let obs = observe(
            "ok",
            Platform::Android,
            vec![
                node(None, &[("class", "Frame"), ("resource-id", "root")]),
                node(
                    Some(0),
                    &[
                        ("class", "Button"),
                        ("resource-id", "ok"),
                        ("test-tag", "ok_btn"),
                        ("content-desc", "Confirm"),
                        ("text", "OK!"),
                    ],
                ),
            ],
            1,
        );
        let profile = ProfileBuilder::default().build(&artifact(), &[obs]).unwrap();
        assert_eq!(profile.primary.strategy, SelectorStrategy::ExactId);
        let fallback_strategies: Vec<_> = profile.fallbacks.iter().map(|c| c.strategy).collect();
        assert_eq!(
            fallback_strategies,
            vec![
                SelectorStrategy::TestMarker,
                SelectorStrategy::AccessibleLabel,
                SelectorStrategy::VisibleText
            ]
        );
        assert!(profile.is_well_formed());
    }

    #[test]
    fn no_unique_candidate_is_an_error() {
        let obs = observe(
            "ghost",
            Platform::Android,
            vec![
                node(None, &[("class", "Text"), ("text", "Hello")]),
                node(None, &[("class", "Text"), ("text", "Hello")]),
            ],
            0,
        );
        let err = ProfileBuilder::default()
            .build(&artifact(), &[obs])
            .unwrap_err();
        assert!(matches!(err, LocatorError::NoUniqueSelector { .. }));
    }

    #[test]
    fn batch_isolates_failures() {
        let good = observe(
            "good",
            Platform::Web,
            vec![node(None, &[("tag", "button"), ("id", "good")])],
            0,
        );
        let bad = observe(
            "bad",
            Platform::Web,
            vec![
                node(None, &[("tag", "span")]),
                node(None, &[("tag", "span")]),
            ],
            0,
        );
        let results = ProfileBuilder::default().build_batch(&artifact(), vec![bad, good]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, LogicalId::new("bad"));
        assert!(results[0].1.is_err());
        let good = results[1].1.as_ref().unwrap();
        assert_eq!(good.primary.strategy, SelectorStrategy::XpathById);
        assert_eq!(good.fallbacks[0].strategy, SelectorStrategy::CssById);
    }

    #[test]
    fn mixed_identities_are_malformed() {
        let a = observe("a", Platform::Web, vec![node(None, &[("id", "a")])], 0);
        let b = observe("b", Platform::Web, vec![node(None, &[("id", "b")])], 0);
        assert!(matches!(
            ProfileBuilder::default().build(&artifact(), &[a, b]),
            Err(LocatorError::MalformedInput(_))
        ));
        assert!(ProfileBuilder::default().build(&artifact(), &[]).is_err());
    }
}
