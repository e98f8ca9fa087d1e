use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealPolicy {
    /// Fallback successes of one strategy that trigger a promotion.
    pub promotion_threshold: u32,
    /// Fallback cap applied to a promoted profile. Not read from config:
    /// callers copy the profile builder's cap so both paths agree.
    #[serde(skip)]
    pub max_fallbacks: usize,
    /// Fresh-read retries after losing a compare-and-swap.
    pub conflict_retries: u32,
    /// Append every consumed report to the store's usage log.
    pub retain_reports: bool,
}

impl Default for HealPolicy {
    fn default() -> Self {
        Self {
            promotion_threshold: 3,
            max_fallbacks: 3,
            conflict_retries: 1,
            retain_reports: true,
        }
    }
}
