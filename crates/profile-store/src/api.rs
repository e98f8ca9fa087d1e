use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use resel_core_types::{
    ArtifactId, FallbackUsageReport, HealingRecord, ProfileKey, SelectorProfile,
};

use crate::errors::{StoreErrKind, StoreError};
use crate::fs_store::FsProfileStore;
use crate::memory::InMemoryProfileStore;
use crate::model::BackupHandle;
use crate::policy::{StoreBackend, StorePolicyView};

pub type StoreResult<T> = Result<T, StoreError>;

/// Versioned profile persistence keyed by `(owning_artifact, logical_id)`.
///
/// Readers never lock. Every write to an existing profile goes through
/// [`ProfileStore::compare_and_swap`], which retains the replaced version as
/// a backup before the swap becomes visible.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Persist a freshly built profile; fails if the key is taken.
    async fn create(&self, profile: SelectorProfile) -> StoreResult<()>;

    async fn get(&self, key: &ProfileKey) -> StoreResult<SelectorProfile>;

    /// Replace the profile stored at `expected_version` with `next`, whose
    /// version must be `expected_version + 1`. Returns the backup of the
    /// replaced version.
    async fn compare_and_swap(
        &self,
        key: &ProfileKey,
        expected_version: u64,
        next: SelectorProfile,
    ) -> StoreResult<BackupHandle>;

    /// Retain a copy of the current version. Idempotent per version.
    async fn backup(&self, key: &ProfileKey) -> StoreResult<BackupHandle>;

    /// Retained versions, oldest first.
    async fn history(&self, key: &ProfileKey) -> StoreResult<Vec<BackupHandle>>;

    async fn load_backup(&self, key: &ProfileKey, version: u64) -> StoreResult<SelectorProfile>;

    async fn keys(&self, artifact: Option<&ArtifactId>) -> StoreResult<Vec<ProfileKey>>;

    async fn append_report(&self, report: &FallbackUsageReport) -> StoreResult<()>;

    async fn reports(&self, artifact: Option<&ArtifactId>) -> StoreResult<Vec<FallbackUsageReport>>;

    async fn append_healing(&self, record: &HealingRecord) -> StoreResult<()>;

    async fn healing_records(&self, artifact: Option<&ArtifactId>)
        -> StoreResult<Vec<HealingRecord>>;

    /// Artifacts owning at least one stored profile.
    async fn artifacts(&self) -> StoreResult<Vec<ArtifactId>> {
        let mut artifacts: Vec<ArtifactId> = self
            .keys(None)
            .await?
            .into_iter()
            .map(|key| key.artifact)
            .collect();
        artifacts.dedup();
        Ok(artifacts)
    }

    /// Re-install a retained version as the newest one (`current + 1`).
    async fn restore(&self, key: &ProfileKey, version: u64) -> StoreResult<SelectorProfile> {
        let mut restored = self.load_backup(key, version).await?;
        let current = self.get(key).await?;
        restored.version = current.version + 1;
        restored.refresh_stability();
        self.compare_and_swap(key, current.version, restored.clone())
            .await?;
        info!(
            key = %key,
            from_version = version,
            new_version = restored.version,
            "restored profile from backup"
        );
        Ok(restored)
    }
}

#[derive(Clone)]
pub struct ProfileStoreBuilder {
    policy: StorePolicyView,
}

impl ProfileStoreBuilder {
    pub fn new(policy: StorePolicyView) -> Self {
        Self { policy }
    }

    pub fn build(self) -> Arc<dyn ProfileStore> {
        match self.policy.backend {
            StoreBackend::Memory => Arc::new(InMemoryProfileStore::new()),
            StoreBackend::Fs => Arc::new(FsProfileStore::new(self.policy.io)),
        }
    }
}

/// A swap must keep the key and advance the version by exactly one.
pub(crate) fn check_successor(
    key: &ProfileKey,
    expected_version: u64,
    next: &SelectorProfile,
) -> StoreResult<()> {
    if next.key() != *key {
        return Err(StoreErrKind::InvalidProfile(format!(
            "profile {} written under key {}",
            next.key(),
            key
        ))
        .into());
    }
    if next.version != expected_version + 1 {
        return Err(StoreErrKind::InvalidProfile(format!(
            "version {} does not follow {}",
            next.version, expected_version
        ))
        .into());
    }
    Ok(())
}

pub(crate) fn check_initial(profile: &SelectorProfile) -> StoreResult<()> {
    if profile.version == 0 {
        return Err(StoreErrKind::InvalidProfile(format!(
            "profile {} has version 0",
            profile.key()
        ))
        .into());
    }
    Ok(())
}

pub(crate) fn conflict(key: &ProfileKey, expected: u64, actual: u64) -> StoreError {
    StoreErrKind::VersionConflict {
        key: key.clone(),
        expected,
        actual,
    }
    .into()
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use resel_core_types::SelectorStrategy;
    use tempfile::tempdir;

    fn stores(root: &std::path::Path) -> Vec<Arc<dyn ProfileStore>> {
        vec![
            ProfileStoreBuilder::new(StorePolicyView::memory()).build(),
            ProfileStoreBuilder::new(StorePolicyView::fs(root)).build(),
        ]
    }

    fn promoted(base: &SelectorProfile) -> SelectorProfile {
        let mut next = base.clone();
        std::mem::swap(&mut next.primary, &mut next.fallbacks[0]);
        next.version = base.version + 1;
        next.refresh_stability();
        next
    }

    #[tokio::test]
    async fn create_rejects_duplicates() {
        let tmp = tempdir().expect("temp dir");
        for store in stores(tmp.path()) {
            let profile = profile("login_test", "login_button", 1);
            store.create(profile.clone()).await.expect("create");
            assert_eq!(store.get(&profile.key()).await.expect("get"), profile);
            let err = store.create(profile.clone()).await.unwrap_err();
            assert!(matches!(err.kind(), StoreErrKind::AlreadyExists(_)));
            let missing = ProfileKey::new("login_test".into(), "nope".into());
            assert!(store.get(&missing).await.unwrap_err().is_not_found());
        }
    }

    #[tokio::test]
    async fn swap_retains_previous_version() {
        let tmp = tempdir().expect("temp dir");
        for store in stores(tmp.path()) {
            let base = profile("login_test", "login_button", 1);
            let key = base.key();
            store.create(base.clone()).await.expect("create");

            let handle = store
                .compare_and_swap(&key, 1, promoted(&base))
                .await
                .expect("swap");
            assert_eq!(handle.version, 1);
            assert!(handle.path.ends_with("login_button.v1.bak"));

            let current = store.get(&key).await.expect("get");
            assert_eq!(current.version, 2);
            assert_eq!(current.primary.strategy, SelectorStrategy::VisibleText);
            assert_eq!(store.load_backup(&key, 1).await.expect("backup"), base);

            let history = store.history(&key).await.expect("history");
            assert_eq!(history.len(), 1);
            assert_eq!(history[0].version, 1);
        }
    }

    #[tokio::test]
    async fn stale_version_conflicts() {
        let tmp = tempdir().expect("temp dir");
        for store in stores(tmp.path()) {
            let base = profile("a", "e", 1);
            let key = base.key();
            store.create(base.clone()).await.expect("create");
            store
                .compare_and_swap(&key, 1, promoted(&base))
                .await
                .expect("first swap");

            let err = store
                .compare_and_swap(&key, 1, promoted(&base))
                .await
                .unwrap_err();
            assert!(err.is_conflict());
            assert_eq!(store.get(&key).await.expect("get").version, 2);
            assert_eq!(store.history(&key).await.expect("history").len(), 1);
        }
    }

    #[tokio::test]
    async fn swap_requires_successor_version() {
        let tmp = tempdir().expect("temp dir");
        for store in stores(tmp.path()) {
            let base = profile("a", "e", 1);
            let key = base.key();
            store.create(base.clone()).await.expect("create");
            let mut skipped = promoted(&base);
            skipped.version = 5;
            let err = store.compare_and_swap(&key, 1, skipped).await.unwrap_err();
            assert!(matches!(err.kind(), StoreErrKind::InvalidProfile(_)));
            let foreign = profile("b", "e", 2);
            assert!(store.compare_and_swap(&key, 1, foreign).await.is_err());
        }
    }

    #[tokio::test]
    async fn restore_installs_new_version() {
        let tmp = tempdir().expect("temp dir");
        for store in stores(tmp.path()) {
            let base = profile("a", "e", 1);
            let key = base.key();
            store.create(base.clone()).await.expect("create");
            store
                .compare_and_swap(&key, 1, promoted(&base))
                .await
                .expect("swap");

            let restored = store.restore(&key, 1).await.expect("restore");
            assert_eq!(restored.version, 3);
            assert_eq!(restored.primary, base.primary);
            assert_eq!(store.get(&key).await.expect("get"), restored);
            let versions: Vec<u64> = store
                .history(&key)
                .await
                .expect("history")
                .iter()
                .map(|handle| handle.version)
                .collect();
            assert_eq!(versions, vec![1, 2]);
            assert!(matches!(
                store.restore(&key, 9).await.unwrap_err().kind(),
                StoreErrKind::BackupMissing { .. }
            ));
        }
    }

    #[tokio::test]
    async fn backup_is_idempotent_per_version() {
        let tmp = tempdir().expect("temp dir");
        for store in stores(tmp.path()) {
            let base = profile("a", "e", 1);
            store.create(base.clone()).await.expect("create");
            store.backup(&base.key()).await.expect("backup");
            store.backup(&base.key()).await.expect("backup again");
            assert_eq!(store.history(&base.key()).await.expect("history").len(), 1);
        }
    }

    #[tokio::test]
    async fn logs_are_filtered_by_artifact() {
        let tmp = tempdir().expect("temp dir");
        for store in stores(tmp.path()) {
            store.append_report(&report("a", "x")).await.expect("report");
            store.append_report(&report("a", "y")).await.expect("report");
            store.append_report(&report("b", "x")).await.expect("report");
            store.append_healing(&healing("b", "x")).await.expect("audit");

            let a: ArtifactId = "a".into();
            let b: ArtifactId = "b".into();
            assert_eq!(store.reports(Some(&a)).await.expect("reports").len(), 2);
            assert_eq!(store.reports(None).await.expect("reports").len(), 3);
            assert!(store
                .healing_records(Some(&a))
                .await
                .expect("audit")
                .is_empty());
            assert_eq!(
                store.healing_records(Some(&b)).await.expect("audit")[0].promoted_strategy,
                SelectorStrategy::VisibleText
            );
        }
    }

    #[tokio::test]
    async fn keys_and_artifacts_are_listed() {
        let tmp = tempdir().expect("temp dir");
        for store in stores(tmp.path()) {
            store.create(profile("b", "one", 1)).await.expect("create");
            store.create(profile("a", "two", 1)).await.expect("create");
            store.create(profile("a", "one", 1)).await.expect("create");

            let a: ArtifactId = "a".into();
            let keys = store.keys(Some(&a)).await.expect("keys");
            assert_eq!(
                keys,
                vec![
                    ProfileKey::new("a".into(), "one".into()),
                    ProfileKey::new("a".into(), "two".into())
                ]
            );
            let artifacts = store.artifacts().await.expect("artifacts");
            assert_eq!(artifacts, vec![ArtifactId::new("a"), ArtifactId::new("b")]);
        }
    }
}
