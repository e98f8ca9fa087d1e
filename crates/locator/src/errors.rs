//! Error types for the locator

use resel_core_types::{FallbackUsageReport, LogicalId, ReselError};
use thiserror::Error;

/// Locator error enumeration
#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// Bad raw record or observation set; a caller bug, never retried
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// No candidate was unique across the observations used for the build
    #[error("No unique selector for element '{logical_id}'")]
    NoUniqueSelector { logical_id: LogicalId },

    /// Every strategy in the profile was exhausted at run time
    #[error("Element '{logical_id}' not resolvable after {attempts} attempts")]
    ElementNotResolvable {
        logical_id: LogicalId,
        attempts: usize,
        report: Box<FallbackUsageReport>,
    },

    /// Caller cancelled the resolution before it finished
    #[error("Resolution cancelled for element '{0}'")]
    Cancelled(LogicalId),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LocatorError {
    /// Build-time failures are fatal to one profile only.
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            LocatorError::MalformedInput(_) | LocatorError::NoUniqueSelector { .. }
        )
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            LocatorError::Internal(_) => 3,
            LocatorError::ElementNotResolvable { .. } => 2,
            LocatorError::MalformedInput(_) | LocatorError::NoUniqueSelector { .. } => 1,
            LocatorError::Cancelled(_) => 0,
        }
    }

    /// Failure report attached to a run-time exhaustion.
    pub fn report(&self) -> Option<&FallbackUsageReport> {
        match self {
            LocatorError::ElementNotResolvable { report, .. } => Some(report),
            _ => None,
        }
    }
}

impl From<LocatorError> for ReselError {
    fn from(value: LocatorError) -> Self {
        ReselError::new(value.to_string())
    }
}
