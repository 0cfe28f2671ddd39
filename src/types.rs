// src/types.rs

//! Small strongly-typed options shared by config, CLI and engine.

use std::cmp::Ordering;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Deserialize;

use crate::job::JobRun;

/// Ordering of rows in run tables and the live view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SortOption {
    /// Creation time.
    #[default]
    Created,
    /// Termination time; runs that have not ended sort last.
    Ended,
    /// Execution time.
    Time,
    JobId,
    RunId,
}

impl SortOption {
    /// Compare two runs under this option. Ties fall back to the instance id
    /// so the order is total and stable between redraws.
    pub fn compare(self, a: &JobRun, b: &JobRun, now: DateTime<Utc>) -> Ordering {
        let primary = match self {
            SortOption::Created => a.created_at.cmp(&b.created_at),
            SortOption::Ended => match (a.ended_at(), b.ended_at()) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            SortOption::Time => a.exec_time(now).cmp(&b.exec_time(now)),
            SortOption::JobId => a.instance_id.job_id.cmp(&b.instance_id.job_id),
            SortOption::RunId => a.instance_id.run_id.cmp(&b.instance_id.run_id),
        };
        primary.then_with(|| a.instance_id.cmp(&b.instance_id))
    }

    pub fn sort_runs(self, runs: &mut [JobRun], descending: bool, now: DateTime<Utc>) {
        runs.sort_by(|a, b| {
            let ord = self.compare(a, b, now);
            if descending { ord.reverse() } else { ord }
        });
    }
}

impl FromStr for SortOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "created" => Ok(SortOption::Created),
            "ended" => Ok(SortOption::Ended),
            "time" => Ok(SortOption::Time),
            "job_id" => Ok(SortOption::JobId),
            "run_id" => Ok(SortOption::RunId),
            other => Err(format!(
                "invalid sort option: {other} (expected created, ended, time, job_id or run_id)"
            )),
        }
    }
}

/// How an id pattern is compared against job and run ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingStrategy {
    Exact,
    /// Substring match.
    Partial,
    /// Shell-style glob (`*`, `?`, `[..]`).
    FnMatch,
}

impl FromStr for MatchingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(MatchingStrategy::Exact),
            "partial" => Ok(MatchingStrategy::Partial),
            "fn_match" | "fnmatch" | "glob" => Ok(MatchingStrategy::FnMatch),
            other => Err(format!(
                "invalid matching strategy: {other} (expected exact, partial or fn_match)"
            )),
        }
    }
}

/// When the live view re-polls the environment for the authoritative set of
/// active runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStrategy {
    /// Poll on every tick of the loop (hybrid mode).
    EveryTick,
    /// Poll at a fixed heartbeat interval; events cover the gaps.
    Interval(Duration),
}

impl Default for PollStrategy {
    fn default() -> Self {
        PollStrategy::EveryTick
    }
}

impl FromStr for PollStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tick" | "every_tick" => Ok(PollStrategy::EveryTick),
            other => parse_duration(other).map(PollStrategy::Interval),
        }
    }
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{num_part}': {e}"))?;

    match unit_part.trim().to_lowercase().as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        unit => Err(format!(
            "unsupported duration unit '{unit}'; expected ms, s, m, or h"
        )),
    }
}
