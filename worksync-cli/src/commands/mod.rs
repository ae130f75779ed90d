pub mod diff;
pub mod edits;
pub mod hash;
pub mod merge;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use worksync_core::{config, EngineConfig, WorkItem};

pub(crate) fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

pub(crate) fn load_config(home: &Path) -> Result<EngineConfig> {
    config::load_at(home).context("failed to load ~/.worksync/config.yaml")
}

/// Read a JSON array of work items.
pub(crate) fn read_items(path: &Path) -> Result<Vec<WorkItem>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of work items", path.display()))
}
