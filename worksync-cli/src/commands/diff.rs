//! `worksync diff`: show the reconciliation plan without writing anything.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use worksync_sync::differ::describe_change;
use worksync_sync::{DiffOptions, DiffResult, ManualEditStore, Reconciler};

use super::{home_dir, load_config, read_items};

/// Arguments for `worksync diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Items as last observed on the tracker (JSON array).
    #[arg(long)]
    pub current: PathBuf,

    /// Items produced by the generator (JSON array).
    #[arg(long)]
    pub desired: PathBuf,

    /// Emit the diff as JSON.
    #[arg(long)]
    pub json: bool,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let cfg = load_config(&home)?;
        let edits = ManualEditStore::load_at(&home).context("failed to load manual edits")?;
        let current = read_items(&self.current)?;
        let desired = read_items(&self.desired)?;

        // Edits are loaded for preservation only; diff never saves them.
        let mut reconciler = Reconciler::with_edits(DiffOptions::from(&cfg.diff), edits);
        let result = reconciler.diff(&current, &desired);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
            return Ok(());
        }

        print_diff(&result);
        Ok(())
    }
}

fn print_diff(result: &DiffResult) {
    if !result.has_changes() {
        println!("No differences ({} unchanged).", result.unchanged.len());
        return;
    }

    for item in &result.added {
        println!("{} {}  {}", "+".green().bold(), item.id, item.title);
    }
    for item in &result.removed {
        println!("{} {}  {}", "-".red().bold(), item.id, item.title);
    }
    for modified in &result.modified {
        let fields: Vec<&str> = modified.changes.iter().map(|f| f.name()).collect();
        println!(
            "{} {}  ({})",
            "~".yellow().bold(),
            modified.after.id,
            fields.join(", ")
        );
        for field in &modified.changes {
            let rendered = describe_change(&modified.before, &modified.after, *field);
            print!("{rendered}");
            if !rendered.ends_with('\n') {
                println!();
            }
        }
    }
    println!("\n{result}");
}
