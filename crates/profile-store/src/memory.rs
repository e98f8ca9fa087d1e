use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use resel_core_types::{
    ArtifactId, FallbackUsageReport, HealingRecord, ProfileKey, SelectorProfile,
};

use crate::api::{check_initial, check_successor, conflict, ProfileStore, StoreResult};
use crate::errors::StoreErrKind;
use crate::index::mem::HotIndex;
use crate::model::{BackupHandle, BackupRecord};

/// Process-local store; backups and logs live as long as the value.
#[derive(Default)]
pub struct InMemoryProfileStore {
    hot: HotIndex,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn retain(&self, profile: SelectorProfile) -> BackupHandle {
        let record = BackupRecord::new(profile);
        let handle = record.handle(backup_uri(&record.profile.key(), record.profile.version));
        self.hot.upsert_backup(record);
        handle
    }
}

fn backup_uri(key: &ProfileKey, version: u64) -> String {
    format!("mem://{}/{}.v{version}.bak", key.artifact, key.logical)
}

fn matches_artifact(artifact: Option<&ArtifactId>, owner: &ArtifactId) -> bool {
    artifact.map(|wanted| wanted == owner).unwrap_or(true)
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn create(&self, profile: SelectorProfile) -> StoreResult<()> {
        check_initial(&profile)?;
        let key = profile.key();
        match self.hot.profiles.entry(key.clone()) {
            Entry::Occupied(_) => Err(StoreErrKind::AlreadyExists(key).into()),
            Entry::Vacant(vac) => {
                vac.insert(profile);
                Ok(())
            }
        }
    }

    async fn get(&self, key: &ProfileKey) -> StoreResult<SelectorProfile> {
        self.hot
            .profiles
            .get(key)
            .map(|entry| entry.clone())
            .ok_or_else(|| StoreErrKind::NotFound(key.clone()).into())
    }

    async fn compare_and_swap(
        &self,
        key: &ProfileKey,
        expected_version: u64,
        next: SelectorProfile,
    ) -> StoreResult<BackupHandle> {
        check_successor(key, expected_version, &next)?;
        let mut slot = self
            .hot
            .profiles
            .get_mut(key)
            .ok_or_else(|| StoreErrKind::NotFound(key.clone()))?;
        if slot.version != expected_version {
            return Err(conflict(key, expected_version, slot.version));
        }
        let handle = self.retain(slot.clone());
        *slot = next;
        debug!(key = %key, version = slot.version, "swapped profile");
        Ok(handle)
    }

    async fn backup(&self, key: &ProfileKey) -> StoreResult<BackupHandle> {
        let current = self.get(key).await?;
        Ok(self.retain(current))
    }

    async fn history(&self, key: &ProfileKey) -> StoreResult<Vec<BackupHandle>> {
        Ok(self
            .hot
            .backups
            .get(key)
            .map(|versions| {
                versions
                    .iter()
                    .map(|record| record.handle(backup_uri(key, record.profile.version)))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn load_backup(&self, key: &ProfileKey, version: u64) -> StoreResult<SelectorProfile> {
        self.hot
            .backup(key, version)
            .map(|record| record.profile)
            .ok_or_else(|| {
                StoreErrKind::BackupMissing {
                    key: key.clone(),
                    version,
                }
                .into()
            })
    }

    async fn keys(&self, artifact: Option<&ArtifactId>) -> StoreResult<Vec<ProfileKey>> {
        let mut keys: Vec<ProfileKey> = self
            .hot
            .profiles
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|key| matches_artifact(artifact, &key.artifact))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn append_report(&self, report: &FallbackUsageReport) -> StoreResult<()> {
        self.hot.push_report(report.clone());
        Ok(())
    }

    async fn reports(&self, artifact: Option<&ArtifactId>) -> StoreResult<Vec<FallbackUsageReport>> {
        let mut out = Vec::new();
        for entry in self.hot.reports.iter() {
            if matches_artifact(artifact, entry.key()) {
                out.extend(entry.value().iter().cloned());
            }
        }
        out.sort_by_key(|report| report.timestamp);
        Ok(out)
    }

    async fn append_healing(&self, record: &HealingRecord) -> StoreResult<()> {
        self.hot.push_healing(record.clone());
        Ok(())
    }

    async fn healing_records(
        &self,
        artifact: Option<&ArtifactId>,
    ) -> StoreResult<Vec<HealingRecord>> {
        let mut out = Vec::new();
        for entry in self.hot.audit.iter() {
            if matches_artifact(artifact, entry.key()) {
                out.extend(entry.value().iter().cloned());
            }
        }
        out.sort_by_key(|record| record.timestamp);
        Ok(out)
    }
}
