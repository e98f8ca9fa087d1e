use std::io;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use resel_core_types::{
    ArtifactId, FallbackUsageReport, HealingRecord, ProfileKey, SelectorProfile,
};

use crate::api::{check_initial, check_successor, conflict, ProfileStore, StoreResult};
use crate::errors::{StoreErrKind, StoreError};
use crate::fs::lock::LockFile;
use crate::fs::{layout, reader, writer};
use crate::model::{BackupHandle, BackupRecord};
use crate::policy::IoCfg;

/// Directory-backed store shared by every process pointed at the same root.
///
/// ```text
/// {root}/profiles/{artifact}/{logical}.json
/// {root}/backups/{artifact}/{logical}.v{version}.bak
/// {root}/reports/{artifact}.jsonl
/// {root}/audit/{artifact}.jsonl
/// {root}/locks/{artifact}/{logical}.lock
/// ```
pub struct FsProfileStore {
    io: IoCfg,
    writers: tokio::sync::Mutex<()>,
    logs: Mutex<()>,
}

impl FsProfileStore {
    pub fn new(io: IoCfg) -> Self {
        Self {
            io,
            writers: tokio::sync::Mutex::new(()),
            logs: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.io.root
    }

    async fn lock(&self, key: &ProfileKey) -> StoreResult<LockFile> {
        let lock = LockFile::acquire(
            layout::lock_path(&self.io, key),
            self.io.lock_timeout(),
            self.io.lock_stale(),
        )
        .await?;
        Ok(lock)
    }

    fn read_profile(&self, key: &ProfileKey) -> StoreResult<SelectorProfile> {
        let path = layout::profile_path(&self.io, key);
        let profile: SelectorProfile = reader::read_json(&path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => StoreErrKind::NotFound(key.clone()).into(),
            _ => read_error(&path, err),
        })?;
        owned_by(&path, key, profile)
    }

    fn retain(&self, profile: SelectorProfile) -> StoreResult<BackupHandle> {
        let key = profile.key();
        let record = BackupRecord::new(profile);
        let path = writer::write_json(
            layout::backup_path(&self.io, &key, record.profile.version),
            &record,
        )?;
        Ok(record.handle(path.to_string_lossy().into_owned()))
    }

    fn read_all_profiles(&self, artifact: Option<&ArtifactId>) -> StoreResult<Vec<SelectorProfile>> {
        let root = layout::profiles_root(&self.io);
        let dirs = match artifact {
            Some(artifact) => vec![root.join(layout::segment(artifact.as_str()))],
            None => reader::list_dirs(&root)?,
        };
        let mut profiles = Vec::new();
        for dir in dirs {
            for path in reader::list_files(&dir, "json")? {
                match reader::read_json::<SelectorProfile>(&path) {
                    Ok(profile) => profiles.push(profile),
                    Err(err) => warn!(
                        path = %path.display(),
                        error = %err,
                        "skipping unreadable profile"
                    ),
                }
            }
        }
        Ok(profiles)
    }

    fn read_logs<T>(
        &self,
        root: &Path,
        single: Option<std::path::PathBuf>,
    ) -> StoreResult<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let files = match single {
            Some(path) => vec![path],
            None => reader::list_files(root, "jsonl")?,
        };
        let mut out = Vec::new();
        for path in files {
            out.extend(reader::read_lines::<T>(&path)?);
        }
        Ok(out)
    }
}

/// A file only counts for `key` when the profile inside names the same key.
fn owned_by(path: &Path, key: &ProfileKey, profile: SelectorProfile) -> StoreResult<SelectorProfile> {
    let found = profile.key();
    if found != *key {
        return Err(StoreErrKind::Corrupt(format!(
            "{} holds profile {found}, expected {key}",
            path.display()
        ))
        .into());
    }
    Ok(profile)
}

fn read_error(path: &Path, err: io::Error) -> StoreError {
    match err.kind() {
        io::ErrorKind::InvalidData => {
            StoreErrKind::Corrupt(format!("{}: {}", path.display(), err)).into()
        }
        _ => err.into(),
    }
}

#[async_trait]
impl ProfileStore for FsProfileStore {
    async fn create(&self, profile: SelectorProfile) -> StoreResult<()> {
        check_initial(&profile)?;
        let key = profile.key();
        let _writer = self.writers.lock().await;
        let _lock = self.lock(&key).await?;
        let path = layout::profile_path(&self.io, &key);
        if path.exists() {
            return Err(StoreErrKind::AlreadyExists(key).into());
        }
        writer::write_json(path, &profile)?;
        debug!(key = %key, "created profile");
        Ok(())
    }

    async fn get(&self, key: &ProfileKey) -> StoreResult<SelectorProfile> {
        self.read_profile(key)
    }

    async fn compare_and_swap(
        &self,
        key: &ProfileKey,
        expected_version: u64,
        next: SelectorProfile,
    ) -> StoreResult<BackupHandle> {
        check_successor(key, expected_version, &next)?;
        let _writer = self.writers.lock().await;
        let _lock = self.lock(key).await?;
        let current = self.read_profile(key)?;
        if current.version != expected_version {
            return Err(conflict(key, expected_version, current.version));
        }
        let handle = self.retain(current)?;
        writer::write_json(layout::profile_path(&self.io, key), &next)?;
        debug!(key = %key, version = next.version, "swapped profile");
        Ok(handle)
    }

    async fn backup(&self, key: &ProfileKey) -> StoreResult<BackupHandle> {
        let current = self.read_profile(key)?;
        self.retain(current)
    }

    async fn history(&self, key: &ProfileKey) -> StoreResult<Vec<BackupHandle>> {
        let mut handles = Vec::new();
        for path in reader::list_files(&layout::backup_dir(&self.io, key), "bak")? {
            let owned = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| layout::backup_version(key, name))
                .is_some();
            if !owned {
                continue;
            }
            let record: BackupRecord = reader::read_json(&path).map_err(|err| read_error(&path, err))?;
            if record.profile.key() != *key {
                continue;
            }
            handles.push(record.handle(path.to_string_lossy().into_owned()));
        }
        handles.sort_by_key(|handle| handle.version);
        Ok(handles)
    }

    async fn load_backup(&self, key: &ProfileKey, version: u64) -> StoreResult<SelectorProfile> {
        let path = layout::backup_path(&self.io, key, version);
        match reader::read_json::<BackupRecord>(&path) {
            Ok(record) if record.profile.version != version => {
                Err(StoreErrKind::Corrupt(format!(
                    "{} holds version {}, expected {version}",
                    path.display(),
                    record.profile.version
                ))
                .into())
            }
            Ok(record) => owned_by(&path, key, record.profile),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(StoreErrKind::BackupMissing {
                key: key.clone(),
                version,
            }
            .into()),
            Err(err) => Err(read_error(&path, err)),
        }
    }

    async fn keys(&self, artifact: Option<&ArtifactId>) -> StoreResult<Vec<ProfileKey>> {
        let mut keys: Vec<ProfileKey> = self
            .read_all_profiles(artifact)?
            .iter()
            .map(SelectorProfile::key)
            .filter(|key| artifact.map(|wanted| *wanted == key.artifact).unwrap_or(true))
            .collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn append_report(&self, report: &FallbackUsageReport) -> StoreResult<()> {
        let _guard = self.logs.lock();
        writer::append_line(&layout::reports_path(&self.io, &report.owning_artifact), report)?;
        Ok(())
    }

    async fn reports(&self, artifact: Option<&ArtifactId>) -> StoreResult<Vec<FallbackUsageReport>> {
        let single = artifact.map(|artifact| layout::reports_path(&self.io, artifact));
        let mut reports: Vec<FallbackUsageReport> =
            self.read_logs(&layout::reports_root(&self.io), single)?;
        if let Some(artifact) = artifact {
            reports.retain(|report| report.owning_artifact == *artifact);
        }
        reports.sort_by_key(|report| report.timestamp);
        Ok(reports)
    }

    async fn append_healing(&self, record: &HealingRecord) -> StoreResult<()> {
        let _guard = self.logs.lock();
        writer::append_line(&layout::audit_path(&self.io, &record.owning_artifact), record)?;
        Ok(())
    }

    async fn healing_records(
        &self,
        artifact: Option<&ArtifactId>,
    ) -> StoreResult<Vec<HealingRecord>> {
        let single = artifact.map(|artifact| layout::audit_path(&self.io, artifact));
        let mut records: Vec<HealingRecord> =
            self.read_logs(&layout::audit_root(&self.io), single)?;
        if let Some(artifact) = artifact {
            records.retain(|record| record.owning_artifact == *artifact);
        }
        records.sort_by_key(|record| record.timestamp);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::api::fixtures::profile;
    use tempfile::tempdir;

    fn store_at(root: &Path) -> FsProfileStore {
        FsProfileStore::new(IoCfg {
            root: root.to_path_buf(),
            ..IoCfg::default()
        })
    }

    #[tokio::test]
    async fn survives_reopen() {
        let tmp = tempdir().expect("temp dir");
        let base = profile("suite", "ok", 1);
        store_at(tmp.path())
            .create(base.clone())
            .await
            .expect("create");
        assert!(tmp.path().join("profiles/suite/ok.json").exists());

        let reopened = store_at(tmp.path());
        assert_eq!(reopened.get(&base.key()).await.expect("get"), base);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn racing_stores_commit_once() {
        let tmp = tempdir().expect("temp dir");
        let base = profile("suite", "ok", 1);
        let key = base.key();
        let first = Arc::new(store_at(tmp.path()));
        let second = Arc::new(store_at(tmp.path()));
        first.create(base.clone()).await.expect("create");

        let mut next = base.clone();
        next.version = 2;
        let (a, b) = tokio::join!(
            first.compare_and_swap(&key, 1, next.clone()),
            second.compare_and_swap(&key, 1, next.clone())
        );
        let outcomes = [a.is_ok(), b.is_ok()];
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
        let loser = if outcomes[0] { b } else { a };
        assert!(loser.unwrap_err().is_conflict());
        assert_eq!(first.get(&key).await.expect("get").version, 2);
        assert!(!tmp.path().join("locks/suite/ok.lock").exists());
    }

    #[tokio::test]
    async fn corrupt_lines_are_skipped() {
        let tmp = tempdir().expect("temp dir");
        let store = store_at(tmp.path());
        let report = crate::api::fixtures::report("suite", "ok");
        store.append_report(&report).await.expect("append");
        std::fs::OpenOptions::new()
            .append(true)
            .open(tmp.path().join("reports/suite.jsonl"))
            .and_then(|mut file| std::io::Write::write_all(&mut file, b"{not json\n"))
            .expect("corrupt log");
        store.append_report(&report).await.expect("append");

        assert_eq!(store.reports(None).await.expect("reports").len(), 2);
    }

    #[tokio::test]
    async fn corrupt_profile_is_reported() {
        let tmp = tempdir().expect("temp dir");
        let store = store_at(tmp.path());
        let key = ProfileKey::new("suite".into(), "ok".into());
        std::fs::create_dir_all(tmp.path().join("profiles/suite")).expect("dirs");
        std::fs::write(tmp.path().join("profiles/suite/ok.json"), b"[]").expect("seed");
        assert!(matches!(
            store.get(&key).await.unwrap_err().kind(),
            StoreErrKind::Corrupt(_)
        ));
    }

    #[tokio::test]
    async fn similar_identifiers_do_not_share_files() {
        let tmp = tempdir().expect("temp dir");
        let store = store_at(tmp.path());
        let underscore = profile("suite/a_b", "ok", 1);
        let space = profile("suite/a b", "ok", 1);
        store.create(underscore.clone()).await.expect("create");
        store.create(space.clone()).await.expect("create");

        assert_eq!(store.get(&underscore.key()).await.expect("get"), underscore);
        assert_eq!(store.get(&space.key()).await.expect("get"), space);
        assert_eq!(store.keys(None).await.expect("keys").len(), 2);
    }

    #[tokio::test]
    async fn dot_artifacts_stay_inside_root() {
        let tmp = tempdir().expect("temp dir");
        let root = tmp.path().join("store");
        let store = store_at(&root);
        let dotted = profile("..", "..", 1);
        store.create(dotted.clone()).await.expect("create");

        assert!(root.join("profiles/%2E%2E/%2E%2E.json").exists());
        assert!(!tmp.path().join("profiles").exists());
        assert_eq!(store.get(&dotted.key()).await.expect("get"), dotted);
    }

    #[tokio::test]
    async fn misplaced_profile_is_corrupt() {
        let tmp = tempdir().expect("temp dir");
        let store = store_at(tmp.path());
        let key = ProfileKey::new("suite".into(), "ok".into());
        let stranger = profile("suite", "other", 1);
        std::fs::create_dir_all(tmp.path().join("profiles/suite")).expect("dirs");
        std::fs::write(
            tmp.path().join("profiles/suite/ok.json"),
            serde_json::to_vec(&stranger).expect("encode"),
        )
        .expect("seed");
        assert!(matches!(
            store.get(&key).await.unwrap_err().kind(),
            StoreErrKind::Corrupt(_)
        ));
    }
}
