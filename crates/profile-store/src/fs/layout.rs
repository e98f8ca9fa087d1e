use std::path::PathBuf;

use resel_core_types::{ArtifactId, ProfileKey};

use crate::policy::IoCfg;

pub fn profile_path(cfg: &IoCfg, key: &ProfileKey) -> PathBuf {
    let mut path = cfg.root.join("profiles");
    path.push(segment(key.artifact.as_str()));
    path.push(format!("{}.json", segment(key.logical.as_str())));
    path
}

pub fn profiles_root(cfg: &IoCfg) -> PathBuf {
    cfg.root.join("profiles")
}

pub fn backup_dir(cfg: &IoCfg, key: &ProfileKey) -> PathBuf {
    let mut path = cfg.root.join("backups");
    path.push(segment(key.artifact.as_str()));
    path
}

pub fn backup_path(cfg: &IoCfg, key: &ProfileKey, version: u64) -> PathBuf {
    let mut path = backup_dir(cfg, key);
    path.push(format!("{}.v{version}.bak", segment(key.logical.as_str())));
    path
}

/// Version encoded in a backup file name belonging to `key`.
pub fn backup_version(key: &ProfileKey, file_name: &str) -> Option<u64> {
    let prefix = format!("{}.v", segment(key.logical.as_str()));
    file_name
        .strip_prefix(&prefix)?
        .strip_suffix(".bak")?
        .parse()
        .ok()
}

pub fn lock_path(cfg: &IoCfg, key: &ProfileKey) -> PathBuf {
    let mut path = cfg.root.join("locks");
    path.push(segment(key.artifact.as_str()));
    path.push(format!("{}.lock", segment(key.logical.as_str())));
    path
}

pub fn reports_root(cfg: &IoCfg) -> PathBuf {
    cfg.root.join("reports")
}

pub fn reports_path(cfg: &IoCfg, artifact: &ArtifactId) -> PathBuf {
    reports_root(cfg).join(format!("{}.jsonl", segment(artifact.as_str())))
}

pub fn audit_root(cfg: &IoCfg) -> PathBuf {
    cfg.root.join("audit")
}

pub fn audit_path(cfg: &IoCfg, artifact: &ArtifactId) -> PathBuf {
    audit_root(cfg).join(format!("{}.jsonl", segment(artifact.as_str())))
}

/// File-system safe rendering of an identifier.
///
/// Bytes outside `[A-Za-z0-9_-]` become `%XX`, so distinct identifiers never
/// share a file and no segment can be `.` or `..`. The empty identifier maps
/// to a lone `%`, which no other input produces.
pub fn segment(raw: &str) -> String {
    if raw.is_empty() {
        return "%".to_string();
    }
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
