//! `worksync merge`: reconcile and write the next state idempotently.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use worksync_sync::{write_idempotent, DiffOptions, ManualEditStore, Reconciler, WriteOptions};

use super::{home_dir, load_config, read_items};

/// Arguments for `worksync merge`.
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Items as last observed on the tracker (JSON array).
    #[arg(long)]
    pub current: PathBuf,

    /// Items produced by the generator (JSON array).
    #[arg(long)]
    pub desired: PathBuf,

    /// Where to write the merged items.
    #[arg(long)]
    pub out: PathBuf,

    /// Previously generated items; fields where `--current` diverges from
    /// them are recorded as manual edits before merging.
    #[arg(long)]
    pub generated: Option<PathBuf>,

    /// Report what would be written without touching the filesystem.
    #[arg(long)]
    pub dry_run: bool,
}

impl MergeArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let cfg = load_config(&home)?;
        let edits = ManualEditStore::load_at(&home).context("failed to load manual edits")?;
        let current = read_items(&self.current)?;
        let desired = read_items(&self.desired)?;

        let mut reconciler = Reconciler::with_edits(DiffOptions::from(&cfg.diff), edits);
        if let Some(path) = &self.generated {
            let generated = read_items(path)?;
            let recorded = reconciler.observe(&generated, &current);
            if recorded > 0 {
                println!("Recorded {recorded} manual edit(s).");
            }
        }

        let plan = reconciler.reconcile(&current, &desired);
        let mut content = serde_json::to_string_pretty(&plan.next)?;
        content.push('\n');

        let options = WriteOptions {
            dry_run: self.dry_run,
            ..WriteOptions::from(&cfg.write)
        };
        let changed = write_idempotent(&self.out, &content, &options)
            .with_context(|| format!("failed to write {}", self.out.display()))?;

        tracing::debug!(out = %self.out.display(), changed, dry_run = self.dry_run, "merge finished");
        println!("{}", plan.diff);
        let status = match (changed, self.dry_run) {
            (false, _) => "unchanged".dimmed().to_string(),
            (true, true) => "would write".yellow().to_string(),
            (true, false) => "wrote".green().to_string(),
        };
        println!("{status} {}", self.out.display());

        if !self.dry_run {
            reconciler
                .edits()
                .save_at(&home)
                .context("failed to save manual edits")?;
        }
        Ok(())
    }
}
