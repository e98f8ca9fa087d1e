use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use resel_core_types::{ProfileKey, SelectorProfile};

/// Reference to one retained copy of a profile version.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackupHandle {
    pub key: ProfileKey,
    pub version: u64,
    pub path: String,
    pub created_at: DateTime<Utc>,
}

/// On-disk body of a backup file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackupRecord {
    pub created_at: DateTime<Utc>,
    pub profile: SelectorProfile,
}

impl BackupRecord {
    pub fn new(profile: SelectorProfile) -> Self {
        Self {
            created_at: Utc::now(),
            profile,
        }
    }

    pub fn handle(&self, path: String) -> BackupHandle {
        BackupHandle {
            key: self.profile.key(),
            version: self.profile.version,
            path,
            created_at: self.created_at,
        }
    }
}
