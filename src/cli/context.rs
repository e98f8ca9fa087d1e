use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::OnceCell;

use resel_core_types::{ArtifactId, LogicalId, ProfileKey};
use resel_profile_store::{ProfileStore, ProfileStoreBuilder};

use super::output::OutputFormat;
use crate::config::Config;

pub struct CliContext {
    config: Arc<Config>,
    config_path: PathBuf,
    output: OutputFormat,
    store: OnceCell<Arc<dyn ProfileStore>>,
}

impl CliContext {
    pub fn new(config: Config, config_path: PathBuf, output: OutputFormat) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            output,
            store: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn output(&self) -> OutputFormat {
        self.output
    }

    /// Store built from the effective configuration, shared across one command.
    pub async fn store(&self) -> Arc<dyn ProfileStore> {
        self.store
            .get_or_init(|| async { ProfileStoreBuilder::new(self.config.store.clone()).build() })
            .await
            .clone()
    }
}

pub fn profile_key(artifact: &str, element: &str) -> ProfileKey {
    ProfileKey::new(ArtifactId::new(artifact), LogicalId::new(element))
}
