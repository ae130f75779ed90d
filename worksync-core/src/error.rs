//! Error types for worksync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from config and domain operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Underlying I/O failure (permission denied, unreadable file, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Well-formed YAML holding a value outside its allowed range.
    #[error("invalid config at {path}: {message}")]
    Invalid { path: PathBuf, message: String },

    /// `dirs::home_dir()` returned `None`; cannot locate `~/.worksync/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// A field name that is not one of the comparable work-item fields.
    #[error("unknown work item field '{0}'")]
    UnknownField(String),
}
