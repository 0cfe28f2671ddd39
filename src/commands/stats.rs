// src/commands/stats.rs

use std::collections::BTreeMap;
use std::io::Write;

use chrono::{DateTime, Duration, Utc};
use crossterm::style::Stylize;

use crate::cli::PatternArgs;
use crate::errors::Result;
use crate::job::{JobRun, Outcome, TerminationStatus};
use crate::view::table::{format_exec_time, format_timestamp};

use super::{criteria_from, CommandContext};

const TITLES: [&str; 10] = [
    "JOB ID",
    "RUNS",
    "FIRST RUN",
    "LAST RUN",
    "AVERAGE",
    "SLOWEST",
    "LAST",
    "LAST STATUS",
    "FAULTS",
    "WARNINGS",
];

/// Aggregates over the ended runs of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStats {
    pub job_id: String,
    pub count: usize,
    pub first_created: DateTime<Utc>,
    pub last_created: DateTime<Utc>,
    pub average: Duration,
    pub slowest: Duration,
    pub last_time: Duration,
    pub last_status: Option<TerminationStatus>,
    pub faults: usize,
    /// Runs that raised at least one warning.
    pub warnings: usize,
}

impl JobStats {
    fn seed(run: &JobRun, now: DateTime<Utc>) -> Self {
        Self {
            job_id: run.instance_id.job_id.clone(),
            count: 0,
            first_created: run.created_at,
            last_created: run.created_at,
            average: Duration::zero(),
            slowest: Duration::zero(),
            last_time: run.exec_time(now),
            last_status: run.termination.as_ref().map(|t| t.status),
            faults: 0,
            warnings: 0,
        }
    }

    fn cells(&self) -> [String; 10] {
        [
            self.job_id.clone(),
            self.count.to_string(),
            format_timestamp(self.first_created),
            format_timestamp(self.last_created),
            format_exec_time(self.average),
            format_exec_time(self.slowest),
            format_exec_time(self.last_time),
            self.last_status.map(|s| s.to_string()).unwrap_or_default(),
            self.faults.to_string(),
            self.warnings.to_string(),
        ]
    }
}

/// Group ended runs by job id, ordered by job id.
pub fn job_stats(runs: &[JobRun], now: DateTime<Utc>) -> Vec<JobStats> {
    let mut by_job: BTreeMap<&str, (JobStats, Duration)> = BTreeMap::new();

    for run in runs {
        let exec = run.exec_time(now);
        let (stats, total) = by_job
            .entry(run.instance_id.job_id.as_str())
            .or_insert_with(|| (JobStats::seed(run, now), Duration::zero()));

        stats.count += 1;
        *total = *total + exec;
        stats.slowest = stats.slowest.max(exec);
        stats.first_created = stats.first_created.min(run.created_at);
        if run.created_at >= stats.last_created {
            stats.last_created = run.created_at;
            stats.last_time = exec;
            stats.last_status = run.termination.as_ref().map(|t| t.status);
        }
        if run.termination.as_ref().map(|t| t.outcome()) == Some(Outcome::Fault) {
            stats.faults += 1;
        }
        if !run.warnings.is_empty() {
            stats.warnings += 1;
        }
    }

    by_job
        .into_values()
        .map(|(mut stats, total)| {
            stats.average = total / stats.count.max(1) as i32;
            stats
        })
        .collect()
}

/// Print per-job statistics over every matching ended run.
pub async fn run<W: Write>(ctx: &CommandContext, args: &PatternArgs, out: &mut W) -> Result<()> {
    let criteria = criteria_from(args)?;
    let runs = ctx
        .connector
        .read_history_runs(&criteria, usize::MAX)
        .await?;

    let stats = job_stats(&runs, Utc::now());
    if stats.is_empty() {
        writeln!(out, "No ended runs")?;
        return Ok(());
    }

    let rows: Vec<[String; 10]> = stats.iter().map(JobStats::cells).collect();
    let widths: Vec<usize> = (0..TITLES.len())
        .map(|i| {
            rows.iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(TITLES[i].len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header = padded(TITLES.iter().map(|t| t.to_string()), &widths);
    writeln!(out, "{}", if ctx.color { header.bold().to_string() } else { header })?;
    for row in rows {
        writeln!(out, "{}", padded(row.into_iter(), &widths))?;
    }
    Ok(())
}

fn padded(cells: impl Iterator<Item = String>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, w)| format!("{cell:<w$}", w = *w))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}
