//! Engine configuration and on-disk state locations.
//!
//! # Storage layout
//!
//! ```text
//! ~/.worksync/
//!   config.yaml              (optional; defaults apply when absent)
//!   state/
//!     operations.json        (idempotency records)
//!     manual_edits.json      (protected human edits)
//! ```
//!
//! # API pattern
//!
//! Every function touching the home directory has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Field;

// ---------------------------------------------------------------------------
// 1. Sections
// ---------------------------------------------------------------------------

/// Retry budget and backoff schedule for remote calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Upper bound of additive jitter, as a fraction of the pre-jitter delay.
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter_ratio: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Politeness batching for remote create/update calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub size: usize,
    pub pause_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: 5,
            pause_ms: 1_000,
        }
    }
}

impl BatchConfig {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

/// Which fields reconciliation compares, and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    pub fields: Vec<Field>,
    pub ignore: Vec<Field>,
    pub preserve_manual_edits: bool,
    /// Compare list fields as sets rather than sequences.
    pub unordered_arrays: bool,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            fields: Field::checked().to_vec(),
            ignore: vec![Field::TemplateId],
            preserve_manual_edits: true,
            unordered_arrays: true,
        }
    }
}

/// Text encoding used by the idempotent writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    #[default]
    Utf8,
    /// UTF-8 prefixed with a byte-order mark.
    Utf8Bom,
}

/// Defaults for idempotent artifact writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteConfig {
    pub create_backup: bool,
    pub ensure_directory: bool,
    pub encoding: Encoding,
    /// Rewrite CRLF as LF before hashing and writing.
    pub normalize_line_endings: bool,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            create_backup: false,
            ensure_directory: true,
            encoding: Encoding::Utf8,
            normalize_line_endings: false,
        }
    }
}

/// Root of `~/.worksync/config.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub retry: RetryConfig,
    pub batch: BatchConfig,
    pub diff: DiffConfig,
    pub write: WriteConfig,
}

// ---------------------------------------------------------------------------
// 2. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.worksync/`
pub fn root_at(home: &Path) -> PathBuf {
    home.join(".worksync")
}

/// `<home>/.worksync/config.yaml`. No I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    root_at(home).join("config.yaml")
}

/// `<home>/.worksync/state/`. No I/O.
pub fn state_dir_at(home: &Path) -> PathBuf {
    root_at(home).join("state")
}

// ---------------------------------------------------------------------------
// 3. Load / save
// ---------------------------------------------------------------------------

/// Load `<home>/.worksync/config.yaml`.
///
/// A missing file yields [`EngineConfig::default`]; malformed YAML yields
/// `CoreError::Parse` with the file path, out-of-range values
/// `CoreError::Invalid`.
pub fn load_at(home: &Path) -> Result<EngineConfig, CoreError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(EngineConfig::default());
    }
    let contents = std::fs::read_to_string(&path)?;
    if contents.trim().is_empty() {
        return Ok(EngineConfig::default());
    }
    let config: EngineConfig =
        serde_yaml::from_str(&contents).map_err(|e| CoreError::Parse {
            path: path.clone(),
            source: e,
        })?;
    validate(&config).map_err(|message| CoreError::Invalid { path, message })?;
    Ok(config)
}

fn validate(config: &EngineConfig) -> Result<(), String> {
    let ratio = config.retry.jitter_ratio;
    if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
        return Err(format!("retry.jitter_ratio must be within [0, 1], got {ratio}"));
    }
    Ok(())
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<EngineConfig, CoreError> {
    load_at(&home()?)
}

/// Atomically save `config` to `<home>/.worksync/config.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `rename`.
pub fn save_at(home: &Path, config: &EngineConfig) -> Result<(), CoreError> {
    let root = root_at(home);
    std::fs::create_dir_all(&root)?;
    let path = config_path_at(home);
    let tmp = path.with_extension("yaml.tmp");
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp, yaml)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}

/// Resolve the user home directory.
pub fn home() -> Result<PathBuf, CoreError> {
    dirs::home_dir().ok_or(CoreError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
