//! `worksync edits list` and `worksync edits clear`

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tabled::{settings::Style, Table, Tabled};

use worksync_core::{Field, WorkItemId};
use worksync_sync::{ManualEdit, ManualEditStore};

use super::home_dir;

/// Manual edits protected from regeneration.
#[derive(Subcommand, Debug)]
pub enum EditsCommand {
    /// List recorded manual edits.
    List(ListArgs),

    /// Forget manual edits so the generator's values go through again.
    Clear(ClearArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show edits for this item.
    #[arg(long)]
    pub item: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ClearArgs {
    /// Only clear edits for this item. Without it every edit is cleared.
    #[arg(long)]
    pub item: Option<String>,

    /// Only clear this field of `--item`.
    #[arg(long, requires = "item")]
    pub field: Option<Field>,
}

pub fn run(cmd: EditsCommand) -> Result<()> {
    match cmd {
        EditsCommand::List(args) => list(args),
        EditsCommand::Clear(args) => clear(args),
    }
}

#[derive(Tabled)]
struct EditRow {
    #[tabled(rename = "item")]
    item: String,
    #[tabled(rename = "field")]
    field: String,
    #[tabled(rename = "generated")]
    original: String,
    #[tabled(rename = "manual")]
    manual: String,
    #[tabled(rename = "recorded")]
    recorded: String,
}

impl From<&ManualEdit> for EditRow {
    fn from(edit: &ManualEdit) -> Self {
        Self {
            item: edit.item_id.to_string(),
            field: edit.field.to_string(),
            original: edit.original_value.to_string(),
            manual: edit.manual_value.to_string(),
            recorded: edit.timestamp.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

fn list(args: ListArgs) -> Result<()> {
    let home = home_dir()?;
    let store = ManualEditStore::load_at(&home).context("failed to load manual edits")?;
    let mut edits = store.export().edits;
    if let Some(item) = &args.item {
        edits.retain(|edit| edit.item_id.0 == *item);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&edits)?);
        return Ok(());
    }

    if edits.is_empty() {
        println!("No manual edits recorded.");
        return Ok(());
    }

    let rows: Vec<EditRow> = edits.iter().map(EditRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn clear(args: ClearArgs) -> Result<()> {
    let home = home_dir()?;
    let mut store = ManualEditStore::load_at(&home).context("failed to load manual edits")?;
    let before = store.len();

    match (args.item, args.field) {
        (Some(item), Some(field)) => {
            store.clear_edit(&WorkItemId::from(item), field);
        }
        (Some(item), None) => store.clear_item(&WorkItemId::from(item)),
        (None, _) => store.reset(),
    }

    store.save_at(&home).context("failed to save manual edits")?;
    println!("Cleared {} manual edit(s).", before - store.len());
    Ok(())
}
