//! On-disk snapshots of idempotency records and manual edits.
//!
//! Persists JSON documents under `<home>/.worksync/state/`. Writes use the
//! atomic `.tmp` + rename pattern. Persistence is not transactional: two
//! processes saving the same snapshot race, and the last rename wins.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use worksync_core::config::state_dir_at;

use crate::error::{io_err, SyncError};

/// `<home>/.worksync/state/operations.json`
pub fn operations_path_at(home: &Path) -> PathBuf {
    state_dir_at(home).join("operations.json")
}

/// `<home>/.worksync/state/manual_edits.json`
pub fn manual_edits_path_at(home: &Path) -> PathBuf {
    state_dir_at(home).join("manual_edits.json")
}

/// Load a JSON snapshot, or `T::default()` if the file does not yet exist.
pub fn load_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, SyncError> {
    if !path.exists() {
        return Ok(T::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Save a JSON snapshot atomically.
///
/// Writes to `<path>.tmp` then renames to `<path>`.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SyncError> {
    let Some(dir) = path.parent() else {
        return Err(io_err(
            path,
            std::io::Error::other("invalid snapshot path"),
        ));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}
