use resel_core_types::{ProfileKey, ReselError, SelectorStrategy};
use resel_profile_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum HealError {
    #[error("profile store: {0}")]
    Store(#[from] StoreError),

    #[error("strategy '{strategy}' is not part of profile {key}")]
    StrategyNotInProfile {
        key: ProfileKey,
        strategy: SelectorStrategy,
    },

    #[error("healing loop is no longer running")]
    ChannelClosed,
}

impl From<HealError> for ReselError {
    fn from(value: HealError) -> Self {
        ReselError::new(value.to_string())
    }
}
