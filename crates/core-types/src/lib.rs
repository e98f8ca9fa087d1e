//! Shared primitives for the resel selector engine.
//!
//! Identity newtypes, the selector strategy vocabulary and the persisted
//! profile/report records live here so that the locator, the profile store
//! and the healing engine agree on a single data model.

use std::fmt;

use thiserror::Error;

mod profile;
mod report;
mod strategy;

pub use profile::{SelectorCandidate, SelectorProfile, Stability};
pub use report::{FallbackUsageReport, HealingRecord};
pub use strategy::{Platform, SelectorStrategy};

/// Shared error type for the resel crates.
#[derive(Debug, Error, Clone)]
pub enum ReselError {
    #[error("{message}")]
    Message { message: String },
}

impl ReselError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Caller-assigned identity of "the same UI element" across captures and runs.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(transparent))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct LogicalId(pub String);

impl LogicalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LogicalId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of the generated test file/record that embeds a profile.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(transparent))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ArtifactId(pub String);

impl ArtifactId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArtifactId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Store key: one profile per element per owning artifact.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ProfileKey {
    pub artifact: ArtifactId,
    pub logical: LogicalId,
}

impl ProfileKey {
    pub fn new(artifact: ArtifactId, logical: LogicalId) -> Self {
        Self { artifact, logical }
    }
}

impl fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.artifact, self.logical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_key_display() {
        let key = ProfileKey::new("login_test".into(), "login_button".into());
        assert_eq!(key.to_string(), "login_test/login_button");
    }

    #[test]
    fn error_message_passthrough() {
        let err = ReselError::new("boom");
        assert_eq!(err.to_string(), "boom");
    }
}
