use thiserror::Error;

use resel_core_types::{ProfileKey, ReselError};

#[derive(Clone, Debug, Error)]
pub enum StoreErrKind {
    #[error("profile not found: {0}")]
    NotFound(ProfileKey),
    #[error("profile already exists: {0}")]
    AlreadyExists(ProfileKey),
    #[error("version conflict on {key}: expected {expected}, found {actual}")]
    VersionConflict {
        key: ProfileKey,
        expected: u64,
        actual: u64,
    },
    #[error("no backup of {key} at version {version}")]
    BackupMissing { key: ProfileKey, version: u64 },
    #[error("invalid profile: {0}")]
    InvalidProfile(String),
    #[error("lock timeout: {0}")]
    LockTimeout(String),
    #[error("io failure: {0}")]
    IoFailed(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[derive(Clone, Debug, Error)]
#[error(transparent)]
pub struct StoreError(pub StoreErrKind);

impl StoreError {
    pub fn new(kind: StoreErrKind) -> Self {
        Self(kind)
    }

    pub fn kind(&self) -> &StoreErrKind {
        &self.0
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self.0, StoreErrKind::VersionConflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.0, StoreErrKind::NotFound(_))
    }
}

impl From<StoreError> for ReselError {
    fn from(value: StoreError) -> Self {
        ReselError::new(value.to_string())
    }
}

impl From<StoreErrKind> for StoreError {
    fn from(kind: StoreErrKind) -> Self {
        StoreError(kind)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::TimedOut {
            return StoreErrKind::LockTimeout(err.to_string()).into();
        }
        StoreErrKind::IoFailed(err.to_string()).into()
    }
}
