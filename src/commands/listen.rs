// src/commands/listen.rs

use std::io::Write;

use chrono::{DateTime, Utc};
use crossterm::style::Stylize;
use tracing::debug;

use crate::cli::PatternArgs;
use crate::connector::Subscription;
use crate::engine::ShutdownSignal;
use crate::errors::Result;
use crate::job::{InstanceEvent, InstanceId, Stage};
use crate::view::table::format_timestamp;

use super::{criteria_from, ps, CommandContext};

/// Print matching active runs, then one line per lifecycle transition until
/// shutdown. Returns the number of transitions printed.
///
/// The observer is registered before the active runs are fetched, so a
/// transition racing the fetch is printed rather than lost.
pub async fn run<W: Write>(
    ctx: &CommandContext,
    args: &PatternArgs,
    mut shutdown: ShutdownSignal,
    out: &mut W,
) -> Result<usize> {
    let criteria = criteria_from(args)?;
    let (subscription, mut rx) = Subscription::channel(ctx.connector.notifications());

    writeln!(out, "Active instances in [{}]", ctx.connector.env_id())?;
    ps::run(ctx, args, out).await?;
    writeln!(out)?;
    writeln!(out, "Listening for events... (Ctrl+C to stop)")?;
    out.flush()?;

    let mut printed = 0;
    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            event = rx.recv() => event,
        };
        let Some(event) = event else {
            debug!("notification queue closed");
            break;
        };

        let InstanceEvent::LifecycleTransition {
            run,
            new_stage,
            timestamp,
        } = &event
        else {
            continue;
        };
        if !criteria.matches(run) {
            continue;
        }

        writeln!(
            out,
            "{}",
            transition_line(ctx.color, *timestamp, &run.instance_id, *new_stage)
        )?;
        out.flush()?;
        printed += 1;
    }

    subscription.release();
    Ok(printed)
}

/// `<timestamp>  <instance>  <STAGE>`, with the stage colored.
pub(super) fn transition_line(
    color: bool,
    timestamp: DateTime<Utc>,
    id: &InstanceId,
    new_stage: Stage,
) -> String {
    let stage = new_stage.to_string();
    let stage = if color {
        match new_stage {
            Stage::Created => stage.cyan().to_string(),
            Stage::Running => stage.green().to_string(),
            Stage::Ended => stage.blue().to_string(),
        }
    } else {
        stage
    };
    format!("{}  {id}  {stage}", format_timestamp(timestamp))
}
