//! Idempotent artifact writer.
//!
//! ## `write_idempotent` protocol
//!
//! 1. Encode the new content, normalising CRLF to LF when asked.
//! 2. SHA-256 hash the encoded bytes.
//! 3. Hash whatever is currently on disk at the target path.
//! 4. Compare → return `false` without touching the file if identical.
//! 5. Optionally snapshot the previous content to a timestamped `.bak`.
//! 6. Write to `<path>.worksync.tmp`, then rename onto the target.
//!
//! The rename makes the write all-or-nothing: readers see either the old
//! file or the complete new one, never a partial write.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;

use worksync_core::{Encoding, WriteConfig};

use crate::content_hash::hash_bytes;
use crate::error::{io_err, SyncError};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Options bag for [`write_idempotent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Copy the previous content to `<file>.<timestamp>.bak` before replacing it.
    pub create_backup: bool,
    /// Create missing parent directories.
    pub ensure_directory: bool,
    pub encoding: Encoding,
    /// Rewrite CRLF as LF before hashing and writing. Off by default, so
    /// the file's digest equals `hash_str(content)`.
    pub normalize_line_endings: bool,
    /// Report whether the write would change the file, without writing.
    pub dry_run: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self::from(&WriteConfig::default())
    }
}

impl From<&WriteConfig> for WriteOptions {
    fn from(cfg: &WriteConfig) -> Self {
        Self {
            create_backup: cfg.create_backup,
            ensure_directory: cfg.ensure_directory,
            encoding: cfg.encoding,
            normalize_line_endings: cfg.normalize_line_endings,
            dry_run: false,
        }
    }
}

/// Write `content` to `path` unless the file already holds the same bytes.
///
/// Returns `true` when the file was (or, in dry-run, would be) written and
/// `false` when the existing content already matches.
pub fn write_idempotent(
    path: &Path,
    content: &str,
    options: &WriteOptions,
) -> Result<bool, SyncError> {
    let tmp = PathBuf::from(format!("{}.worksync.tmp", path.display()));
    write_idempotent_with_tmp(path, content, options, &tmp)
}

fn write_idempotent_with_tmp(
    path: &Path,
    content: &str,
    options: &WriteOptions,
    tmp: &Path,
) -> Result<bool, SyncError> {
    let bytes = encode(content, options);
    let digest = hash_bytes(&bytes);

    let existing = read_existing(path)?;
    if let Some(existing) = existing.as_deref() {
        if hash_bytes(existing) == digest {
            tracing::debug!("unchanged: {}", path.display());
            return Ok(false);
        }
    }

    if options.dry_run {
        tracing::info!("[dry-run] would write: {}", path.display());
        return Ok(true);
    }

    if options.ensure_directory {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
    }

    if options.create_backup {
        if let Some(previous) = existing.as_deref() {
            let backup = backup_path(path);
            std::fs::write(&backup, previous).map_err(|e| io_err(&backup, e))?;
            tracing::info!("backed up {} to {}", path.display(), backup.display());
        }
    }

    std::fs::write(tmp, &bytes).map_err(|e| io_err(tmp, e))?;
    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }

    tracing::info!("wrote: {}", path.display());
    Ok(true)
}

fn encode(content: &str, options: &WriteOptions) -> Vec<u8> {
    let normalized = if options.normalize_line_endings {
        content.replace("\r\n", "\n")
    } else {
        content.to_owned()
    };
    match options.encoding {
        Encoding::Utf8 => normalized.into_bytes(),
        Encoding::Utf8Bom => {
            let mut bytes = Vec::with_capacity(UTF8_BOM.len() + normalized.len());
            bytes.extend_from_slice(UTF8_BOM);
            bytes.extend_from_slice(normalized.as_bytes());
            bytes
        }
    }
}

fn read_existing(path: &Path) -> Result<Option<Vec<u8>>, SyncError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}

/// `<dir>/<file>.<UTC timestamp>.bak`
fn backup_path(path: &Path) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.{stamp}.bak"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
