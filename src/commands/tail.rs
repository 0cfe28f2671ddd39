// src/commands/tail.rs

use std::io::Write;

use crossterm::style::Stylize;
use tracing::debug;

use crate::cli::TailArgs;
use crate::connector::Subscription;
use crate::engine::ShutdownSignal;
use crate::errors::Result;
use crate::job::{InstanceEvent, InstanceId};

use super::{criteria_from, CommandContext};

/// Print the buffered output of matching active runs. With `follow`, keep
/// printing new lines as they are produced until shutdown.
///
/// Returns the number of output lines printed.
pub async fn run<W: Write>(
    ctx: &CommandContext,
    args: &TailArgs,
    shutdown: ShutdownSignal,
    out: &mut W,
) -> Result<usize> {
    if args.follow {
        follow(ctx, args, shutdown, out).await
    } else {
        recent(ctx, args, out).await
    }
}

async fn recent<W: Write>(ctx: &CommandContext, args: &TailArgs, out: &mut W) -> Result<usize> {
    let criteria = criteria_from(&args.filter)?;
    let tails = ctx.connector.get_output_tail(&criteria).await?;
    if tails.is_empty() {
        writeln!(out, "No active runs")?;
        return Ok(0);
    }

    let mut printed = 0;
    for tail in tails {
        writeln!(out, "{}", header(ctx.color, &tail.instance_id))?;
        for line in &tail.lines {
            writeln!(out, "{line}")?;
        }
        printed += tail.lines.len();
    }
    Ok(printed)
}

async fn follow<W: Write>(
    ctx: &CommandContext,
    args: &TailArgs,
    mut shutdown: ShutdownSignal,
    out: &mut W,
) -> Result<usize> {
    let criteria = criteria_from(&args.filter)?;
    let (subscription, mut rx) = Subscription::channel(ctx.connector.notifications());

    let mut last: Option<InstanceId> = None;
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

        let InstanceEvent::Output { instance_id, line } = event else {
            continue;
        };
        if !criteria.matches_id(&instance_id) {
            continue;
        }

        if last.as_ref() != Some(&instance_id) {
            writeln!(out, "{}", header(ctx.color, &instance_id))?;
            last = Some(instance_id);
        }
        writeln!(out, "{line}")?;
        out.flush()?;
        printed += 1;
    }

    subscription.release();
    Ok(printed)
}

fn header(color: bool, id: &InstanceId) -> String {
    let text = format!(" ---> {id}");
    if color {
        text.bold().to_string()
    } else {
        text
    }
}
