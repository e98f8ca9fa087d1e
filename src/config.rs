//! Effective configuration of the `resel` binary
//!
//! Aggregates the policy views owned by the library crates. Every section is
//! optional in YAML; missing keys keep their defaults.

use serde::{Deserialize, Serialize};

use resel_locator::LocatorPolicy;
use resel_profile_store::StorePolicyView;
use resel_self_heal::HealPolicy;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub locator: LocatorPolicy,
    pub store: StorePolicyView,
    pub healing: HealPolicy,
}

impl Config {
    /// Upper bound on one resolution for a profile with `fallbacks` entries.
    pub fn resolution_budget(&self, fallbacks: usize) -> std::time::Duration {
        self.locator.runtime.worst_case(fallbacks)
    }

    /// Healing policy whose fallback cap follows `locator.builder`.
    pub fn heal_policy(&self) -> HealPolicy {
        HealPolicy {
            max_fallbacks: self.locator.builder.max_fallbacks,
            ..self.healing.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resel_locator::ReconcileMode;
    use resel_profile_store::StoreBackend;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let raw = r#"
locator:
  builder:
    reconcile: unique_in_majority
store:
  backend: memory
healing:
  promotion_threshold: 5
"#;
        let config: Config = serde_yaml::from_str(raw).expect("parse config");
        assert_eq!(
            config.locator.builder.reconcile,
            ReconcileMode::UniqueInMajority
        );
        assert_eq!(config.locator.builder.max_fallbacks, 3);
        assert_eq!(config.locator.runtime.primary_timeout_ms, 10_000);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.io.lock_timeout_ms, 5_000);
        assert_eq!(config.healing.promotion_threshold, 5);
        assert_eq!(config.healing.conflict_retries, 1);
    }

    #[test]
    fn default_budget_matches_runtime_policy() {
        let config = Config::default();
        assert_eq!(
            config.resolution_budget(3),
            std::time::Duration::from_secs(16)
        );
    }

    #[test]
    fn heal_policy_follows_builder_cap() {
        let raw = r#"
locator:
  builder:
    max_fallbacks: 5
healing:
  promotion_threshold: 2
"#;
        let config: Config = serde_yaml::from_str(raw).expect("parse config");
        let policy = config.heal_policy();
        assert_eq!(policy.max_fallbacks, 5);
        assert_eq!(policy.promotion_threshold, 2);
        let rendered = serde_yaml::to_string(&config).expect("render config");
        assert_eq!(rendered.matches("max_fallbacks").count(), 1);
    }
}
