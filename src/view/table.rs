// src/view/table.rs

//! Plain-text run tables.
//!
//! Cells are computed and padded first, styling is applied last, so ANSI
//! escapes never disturb the column widths.

use chrono::{DateTime, Duration, Local, Utc};
use crossterm::style::{StyledContent, Stylize};

use crate::job::{JobRun, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    JobId,
    RunId,
    Created,
    Ended,
    Time,
    TermStatus,
    Phases,
    Warn,
    Status,
}

impl Column {
    pub const ALL: [Column; 9] = [
        Column::JobId,
        Column::RunId,
        Column::Created,
        Column::Ended,
        Column::Time,
        Column::TermStatus,
        Column::Phases,
        Column::Warn,
        Column::Status,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Column::JobId => "JOB ID",
            Column::RunId => "RUN ID",
            Column::Created => "CREATED",
            Column::Ended => "ENDED",
            Column::Time => "TIME",
            Column::TermStatus => "TERM STATUS",
            Column::Phases => "PHASES",
            Column::Warn => "WARN",
            Column::Status => "STATUS",
        }
    }

    fn max_width(self) -> usize {
        match self {
            Column::JobId | Column::RunId => 30,
            Column::Phases => 24,
            Column::Warn => 20,
            Column::Status => 50,
            _ => usize::MAX,
        }
    }

    pub fn cell(self, run: &JobRun, now: DateTime<Utc>) -> String {
        match self {
            Column::JobId => run.instance_id.job_id.clone(),
            Column::RunId => run.instance_id.run_id.clone(),
            Column::Created => format_timestamp(run.created_at),
            Column::Ended => run.ended_at().map(format_timestamp).unwrap_or_default(),
            Column::Time => format_exec_time(run.exec_time(now)),
            Column::TermStatus => match &run.termination {
                Some(t) => t.status.to_string(),
                None => run.stage.to_string(),
            },
            Column::Phases => run
                .current_phases()
                .map(|p| p.phase_id.as_str())
                .collect::<Vec<_>>()
                .join(","),
            Column::Warn => run.warnings.join(","),
            Column::Status => run.status.clone().unwrap_or_default(),
        }
    }
}

/// One row to print. `dimmed` rows are shown muted (ended runs in the live
/// view).
#[derive(Debug, Clone, Copy)]
pub struct TableRow<'a> {
    pub run: &'a JobRun,
    pub dimmed: bool,
}

/// Format a header plus one line per row.
pub fn format_table(rows: &[TableRow<'_>], now: DateTime<Utc>, color: bool) -> Vec<String> {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            Column::ALL
                .iter()
                .map(|col| truncate(&col.cell(row.run, now), col.max_width()))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = Column::ALL
        .iter()
        .enumerate()
        .map(|(i, col)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(col.title().len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    let header = join_padded(Column::ALL.iter().map(|c| c.title().to_string()), &widths);
    lines.push(if color { header.bold().to_string() } else { header });

    for (row, row_cells) in rows.iter().zip(cells) {
        let line = if color && !row.dimmed {
            join_styled(row.run, row_cells, &widths)
        } else {
            join_padded(row_cells.into_iter(), &widths)
        };
        lines.push(if color && row.dimmed { line.dim().to_string() } else { line });
    }

    lines
}

fn join_padded(cells: impl Iterator<Item = String>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(cell, w)| pad(&cell, *w))
        .collect();
    padded.join("  ").trim_end().to_string()
}

fn join_styled(run: &JobRun, cells: Vec<String>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .into_iter()
        .zip(widths)
        .zip(Column::ALL)
        .map(|((cell, w), col)| {
            let text = pad(&cell, *w);
            match col {
                Column::TermStatus => outcome_style(run, text).to_string(),
                Column::Warn if !run.warnings.is_empty() => text.yellow().to_string(),
                _ => text,
            }
        })
        .collect();
    padded.join("  ").trim_end().to_string()
}

fn outcome_style(run: &JobRun, text: String) -> StyledContent<String> {
    match run.termination.as_ref().map(|t| t.outcome()) {
        Some(Outcome::Success) => text.green(),
        Some(Outcome::Aborted) | Some(Outcome::Rejected) => text.yellow(),
        Some(Outcome::Fault) => text.red(),
        Some(Outcome::NonSuccess) | None => text.stylize(),
    }
}

fn pad(cell: &str, width: usize) -> String {
    let len = cell.chars().count();
    format!("{cell}{}", " ".repeat(width.saturating_sub(len)))
}

fn truncate(cell: &str, max: usize) -> String {
    if cell.chars().count() <= max {
        return cell.to_string();
    }
    let mut out: String = cell.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// Local-time timestamp, e.g. `2026-10-19 14:03:27`.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Execution time as `HH:MM:SS`; hours are not wrapped.
pub fn format_exec_time(d: Duration) -> String {
    let total = d.num_seconds().max(0);
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
