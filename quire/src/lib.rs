use std::path::{Path, PathBuf};

use anyhow::Context;
use quire_core::storage::FsStore;
use tracing::debug;

pub mod cli;
pub mod commands;
pub mod host;

pub struct AppContext {
    pub workspace: anyhow::Result<FsStore>,
}

impl AppContext {
    /// Opens the workspace at `path`, or the nearest one containing the current directory.
    pub async fn new(path: Option<PathBuf>) -> anyhow::Result<AppContext> {
        let workspace = match path {
            Some(path) => FsStore::open(&path)
                .await
                .with_context(|| format!("Failed to open workspace at {}", path.display())),
            None => find_workspace(&std::env::current_dir()?).await,
        };
        Ok(AppContext { workspace })
    }

    pub fn store(self) -> anyhow::Result<FsStore> {
        self.workspace
    }
}

async fn find_workspace(start: &Path) -> anyhow::Result<FsStore> {
    for dir in start.ancestors() {
        match FsStore::open(dir).await {
            Ok(store) => return Ok(store),
            Err(e) => debug!("No workspace at {}: {}", dir.display(), e),
        }
    }
    anyhow::bail!("No workspace found in {} or its parents", start.display())
}
