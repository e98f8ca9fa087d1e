use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    Fs,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StorePolicyView {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default)]
    pub io: IoCfg,
}

impl StorePolicyView {
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            io: IoCfg::default(),
        }
    }

    pub fn fs(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: StoreBackend::Fs,
            io: IoCfg {
                root: root.into(),
                ..IoCfg::default()
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoCfg {
    pub root: PathBuf,
    /// How long a writer waits for the cross-process lock file.
    pub lock_timeout_ms: u64,
    /// Lock files older than this are considered abandoned.
    pub lock_stale_ms: u64,
}

impl IoCfg {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn lock_stale(&self) -> Duration {
        Duration::from_millis(self.lock_stale_ms)
    }
}

impl Default for IoCfg {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./.resel"),
            lock_timeout_ms: 5_000,
            lock_stale_ms: 30_000,
        }
    }
}
