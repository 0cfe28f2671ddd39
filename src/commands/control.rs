// src/commands/control.rs

//! `stop`, `approve` and `resume`.

use std::io::{BufRead, Write};

use chrono::Utc;
use tracing::{debug, info};

use crate::cli::{PhaseArgs, ResumeArgs, StopArgs};
use crate::connector::ControlResult;
use crate::errors::Result;
use crate::criteria::RunCriteria;
use crate::job::{ControlPoint, JobInstance, JobRun};
use crate::view::{format_table, TableRow};

use super::{confirm, target_criteria, CommandContext};

/// Stop every active run matching the patterns, after confirmation unless
/// `--force`. Returns the number of runs stopped.
pub async fn stop<R: BufRead, W: Write>(
    ctx: &CommandContext,
    args: &StopArgs,
    input: &mut R,
    out: &mut W,
) -> Result<usize> {
    let criteria = target_criteria(&args.patterns)?;
    let runs = ctx.connector.get_active_runs(&criteria).await?;

    if runs.is_empty() {
        writeln!(out, "No instances to stop: {}", args.patterns.join(" "))?;
        return Ok(0);
    }

    if !args.force {
        writeln!(out, "Instances to stop:")?;
        print_runs(ctx, &runs, out)?;
        if !confirm(input, out)? {
            return Ok(0);
        }
    }

    let mut stopped = 0;
    for run in &runs {
        let result = ctx.connector.stop(&run.instance_id).await?;
        info!(instance = %run.instance_id, %result, "stop requested");
        if result == ControlResult::Applied {
            stopped += 1;
        }
        writeln!(out, "{} -> {result}", run.instance_id)?;
    }
    Ok(stopped)
}

/// Approve the phase `--phase` of matching runs waiting on it. Returns the
/// number approved.
pub async fn approve<W: Write>(ctx: &CommandContext, args: &PhaseArgs, out: &mut W) -> Result<usize> {
    let criteria = target_criteria(&args.patterns)?;
    let candidates = controllable(ctx, &criteria, &args.phase_id, ControlPoint::Approval).await?;

    let mut approved = Vec::new();
    for instance in &candidates {
        if ctx.connector.approve(instance.id(), &args.phase_id).await? == ControlResult::Applied {
            approved.push(instance.id().clone());
        }
    }

    if !approved.is_empty() {
        writeln!(out, "Approved:")?;
        for id in &approved {
            writeln!(out, "{id}")?;
        }
    }
    Ok(approved.len())
}

/// Resume runs parked at checkpoint `--phase`, one pattern at a time, each
/// confirmed unless `--force`. Returns the number resumed.
pub async fn resume<R: BufRead, W: Write>(
    ctx: &CommandContext,
    args: &ResumeArgs,
    input: &mut R,
    out: &mut W,
) -> Result<usize> {
    let phase_id = &args.target.phase_id;
    let mut total = 0;

    for pattern in &args.target.patterns {
        let criteria = target_criteria(std::slice::from_ref(pattern))?;
        let matched = ctx.connector.get_active_runs(&criteria).await?;
        if matched.is_empty() {
            writeln!(out, "No instances found for pattern: {pattern}")?;
            continue;
        }

        let resumable = controllable(ctx, &criteria, phase_id, ControlPoint::Checkpoint).await?;
        if resumable.is_empty() {
            writeln!(
                out,
                "Pattern {pattern} matches {} instance(s), but none is waiting at checkpoint '{phase_id}'",
                matched.len()
            )?;
            continue;
        }

        writeln!(out, "Pattern {pattern} matches ({} resumable):", resumable.len())?;
        if !args.force {
            let runs: Vec<JobRun> = resumable.iter().map(|i| i.snap().clone()).collect();
            print_runs(ctx, &runs, out)?;
            if !confirm(input, out)? {
                writeln!(out, "Skipped")?;
                continue;
            }
        }

        for instance in &resumable {
            match ctx.connector.resume(instance.id(), phase_id).await? {
                ControlResult::Applied => {
                    writeln!(out, "  Resumed {}", instance.id())?;
                    total += 1;
                }
                other => writeln!(out, "  {} -> {other}", instance.id())?,
            }
        }
    }

    writeln!(out, "Total resumed: {total}")?;
    Ok(total)
}

/// Active instances matching `criteria` with `phase_id` parked at a control
/// point of `kind`.
async fn controllable(
    ctx: &CommandContext,
    criteria: &RunCriteria,
    phase_id: &str,
    kind: ControlPoint,
) -> Result<Vec<JobInstance>> {
    let runs = ctx.connector.get_active_runs(criteria).await?;
    let mut found = Vec::new();
    for run in runs {
        // The run may end between the listing and this fetch.
        let Some(instance) = ctx.connector.get_instance(&run.instance_id).await? else {
            debug!(instance = %run.instance_id, "instance gone before phase lookup");
            continue;
        };
        if instance.find_phase_control(phase_id, kind).is_some() {
            found.push(instance);
        }
    }
    Ok(found)
}

fn print_runs<W: Write>(ctx: &CommandContext, runs: &[JobRun], out: &mut W) -> Result<()> {
    let rows: Vec<TableRow<'_>> = runs
        .iter()
        .map(|run| TableRow { run, dimmed: false })
        .collect();
    for line in format_table(&rows, Utc::now(), ctx.color) {
        writeln!(out, "{line}")?;
    }
    Ok(())
}
