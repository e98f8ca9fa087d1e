use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Policy snapshot consumed by the build-time pipeline and the resolution runtime.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorPolicy {
    pub normalizer: NormalizerCfg,
    pub generator: GeneratorCfg,
    pub builder: BuilderCfg,
    pub runtime: RuntimeCfg,
}

/// Bounds applied while mapping raw records onto the canonical vocabulary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerCfg {
    pub max_text_len: usize,
}

impl Default for NormalizerCfg {
    fn default() -> Self {
        Self { max_text_len: 200 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorCfg {
    /// Drop text candidates whose value looks generated (counters, prices).
    pub skip_dynamic_text: bool,
}

/// How candidate sets from repeated observations are reconciled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMode {
    /// Eligible only if unique in every observation where the strategy appeared.
    #[default]
    UniqueInEvery,
    /// Eligible if unique in more than half of the observations where it appeared.
    UniqueInMajority,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderCfg {
    pub max_fallbacks: usize,
    pub reconcile: ReconcileMode,
}

impl Default for BuilderCfg {
    fn default() -> Self {
        Self {
            max_fallbacks: 3,
            reconcile: ReconcileMode::UniqueInEvery,
        }
    }
}

/// Per-attempt budgets for the resolution state machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeCfg {
    pub primary_timeout_ms: u64,
    pub fallback_timeout_ms: u64,
    /// Emit a report with `succeeded_index = 0` on primary success.
    pub report_primary_success: bool,
}

impl RuntimeCfg {
    pub fn primary_timeout(&self) -> Duration {
        Duration::from_millis(self.primary_timeout_ms)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_millis(self.fallback_timeout_ms)
    }

    /// Upper bound on one resolution: `primary + n * fallback`.
    pub fn worst_case(&self, fallbacks: usize) -> Duration {
        self.primary_timeout() + self.fallback_timeout() * fallbacks as u32
    }
}

impl Default for RuntimeCfg {
    fn default() -> Self {
        Self {
            primary_timeout_ms: 10_000,
            fallback_timeout_ms: 2_000,
            report_primary_success: false,
        }
    }
}
