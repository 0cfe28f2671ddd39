// src/commands/history.rs

use std::io::Write;

use chrono::Utc;

use crate::cli::HistoryArgs;
use crate::errors::Result;
use crate::view::{format_table, TableRow};

use super::{criteria_from, CommandContext};

/// Print ended runs, most recently created first.
pub async fn run<W: Write>(ctx: &CommandContext, args: &HistoryArgs, out: &mut W) -> Result<()> {
    let criteria = criteria_from(&args.filter)?;
    let runs = ctx
        .connector
        .read_history_runs(&criteria, args.limit)
        .await?;

    if runs.is_empty() {
        writeln!(out, "No ended runs")?;
        return Ok(());
    }

    let rows: Vec<TableRow<'_>> = runs
        .iter()
        .map(|run| TableRow { run, dimmed: false })
        .collect();
    for line in format_table(&rows, Utc::now(), ctx.color) {
        writeln!(out, "{line}")?;
    }
    Ok(())
}
