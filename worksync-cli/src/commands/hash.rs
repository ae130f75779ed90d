//! `worksync hash <path>`: print a content digest.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;

use worksync_sync::{hash_file, hash_json};

/// Arguments for `worksync hash`.
#[derive(Args, Debug)]
pub struct HashArgs {
    /// File to digest.
    pub path: PathBuf,

    /// Parse the file as JSON and digest its canonical form, so key order
    /// and whitespace do not matter.
    #[arg(long)]
    pub canonical: bool,
}

impl HashArgs {
    pub fn run(self) -> Result<()> {
        let digest = if self.canonical {
            let raw = fs::read_to_string(&self.path)
                .with_context(|| format!("failed to read {}", self.path.display()))?;
            let value: Value = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not valid JSON", self.path.display()))?;
            hash_json(&value)
        } else {
            hash_file(&self.path).with_context(|| format!("failed to hash {}", self.path.display()))?
        };
        println!("{digest}  {}", self.path.display());
        Ok(())
    }
}
