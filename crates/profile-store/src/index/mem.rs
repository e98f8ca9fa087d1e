use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use resel_core_types::{
    ArtifactId, FallbackUsageReport, HealingRecord, ProfileKey, SelectorProfile,
};

use crate::model::BackupRecord;

#[derive(Default)]
pub struct HotIndex {
    pub profiles: DashMap<ProfileKey, SelectorProfile>,
    pub backups: DashMap<ProfileKey, Vec<BackupRecord>>,
    pub reports: DashMap<ArtifactId, Vec<FallbackUsageReport>>,
    pub audit: DashMap<ArtifactId, Vec<HealingRecord>>,
}

impl HotIndex {
    /// Insert or replace the retained copy of one version.
    pub fn upsert_backup(&self, record: BackupRecord) {
        let key = record.profile.key();
        match self.backups.entry(key) {
            Entry::Occupied(mut occ) => {
                let versions = occ.get_mut();
                versions.retain(|existing| existing.profile.version != record.profile.version);
                versions.push(record);
                versions.sort_by_key(|existing| existing.profile.version);
            }
            Entry::Vacant(vac) => {
                vac.insert(vec![record]);
            }
        }
    }

    pub fn backup(&self, key: &ProfileKey, version: u64) -> Option<BackupRecord> {
        self.backups.get(key).and_then(|versions| {
            versions
                .iter()
                .find(|record| record.profile.version == version)
                .cloned()
        })
    }

    pub fn push_report(&self, report: FallbackUsageReport) {
        self.reports
            .entry(report.owning_artifact.clone())
            .or_default()
            .push(report);
    }

    pub fn push_healing(&self, record: HealingRecord) {
        self.audit
            .entry(record.owning_artifact.clone())
            .or_default()
            .push(record);
    }
}
