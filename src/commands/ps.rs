// src/commands/ps.rs

use std::io::Write;

use chrono::Utc;

use crate::cli::PatternArgs;
use crate::errors::Result;
use crate::types::SortOption;
use crate::view::{format_table, TableRow};

use super::{criteria_from, CommandContext};

/// Print the active runs matching `args`, oldest first.
pub async fn run<W: Write>(ctx: &CommandContext, args: &PatternArgs, out: &mut W) -> Result<()> {
    let criteria = criteria_from(args)?;
    let mut runs = ctx.connector.get_active_runs(&criteria).await?;

    let now = Utc::now();
    SortOption::Created.sort_runs(&mut runs, false, now);

    if runs.is_empty() {
        writeln!(out, "No active runs")?;
        return Ok(());
    }

    let rows: Vec<TableRow<'_>> = runs
        .iter()
        .map(|run| TableRow { run, dimmed: false })
        .collect();
    for line in format_table(&rows, now, ctx.color) {
        writeln!(out, "{line}")?;
    }
    Ok(())
}
