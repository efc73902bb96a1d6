use std::path::Path;

use clap::crate_version;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::storage::{Error, Result};

/// Contents of a `<id>.quire` file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct DocumentMetadata {
    /// Version of the crate that last wrote the file.
    pub(crate) quire_version: String,
    pub(crate) id: String,
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) is_open: bool,
}

impl DocumentMetadata {
    pub(crate) fn new(id: String, title: String) -> Self {
        DocumentMetadata {
            quire_version: crate_version!().to_string(),
            id,
            title,
            is_open: false,
        }
    }

    /// Marks the metadata as written by this version.
    pub(crate) fn touch(&mut self) {
        self.quire_version = crate_version!().to_string();
    }
}

/// Contents of `.quire/config.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct WorkspaceConfig {
    /// A unique identifier for the workspace instance.
    pub(crate) id: Uuid,
    /// Format version, for future migrations.
    pub(crate) version: u32,
    #[serde(default)]
    pub(crate) session: SessionConfig,
}

impl WorkspaceConfig {
    pub(crate) fn new() -> Self {
        WorkspaceConfig {
            id: Uuid::new_v4(),
            version: 1,
            session: SessionConfig::default(),
        }
    }
}

pub(crate) async fn read_workspace_config(path: &Path) -> Result<WorkspaceConfig> {
    let content = fs::read(path).await.map_err(|e| {
        warn!("Failed to read workspace config file '{}': {}", path.display(), e);
        Error::InvalidWorkspaceConfig(path.to_path_buf())
    })?;

    serde_json::from_slice(&content).map_err(|e| {
        warn!("Failed to parse workspace config file '{}': {}", path.display(), e);
        Error::InvalidWorkspaceConfig(path.to_path_buf())
    })
}

pub(crate) async fn write_workspace_config(path: &Path, config: &WorkspaceConfig) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content).await?;
    debug!("Workspace config written to {}", path.display());
    Ok(())
}
