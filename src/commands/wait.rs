// src/commands/wait.rs

use std::io::Write;

use tracing::{debug, info};

use crate::cli::WaitArgs;
use crate::connector::Subscription;
use crate::engine::ShutdownSignal;
use crate::errors::{Result, TaroError};
use crate::job::{InstanceEvent, Stage};

use super::listen::transition_line;
use super::{criteria_from, CommandContext};

/// Block until `count` lifecycle transitions of matching runs have been
/// seen, printing each one. Runs already at the stage when the command
/// starts do not count.
///
/// Returns the number of transitions printed, which is short of `count`
/// only when interrupted.
pub async fn run<W: Write>(
    ctx: &CommandContext,
    args: &WaitArgs,
    mut shutdown: ShutdownSignal,
    out: &mut W,
) -> Result<usize> {
    let criteria = criteria_from(&args.filter)?;
    let stage: Option<Stage> = args.stage.map(Into::into);
    let wanted = args.count.max(1);
    let (subscription, mut rx) = Subscription::channel(ctx.connector.notifications());

    let timeout = args.timeout;
    let deadline = async move {
        match timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut seen = 0;
    while seen < wanted {
        let event = tokio::select! {
            biased;
            _ = shutdown.wait() => {
                debug!(seen, "wait interrupted");
                break;
            }
            _ = &mut deadline => {
                return Err(TaroError::Timeout(format!(
                    "saw {seen} of {wanted} transition(s) within {:?}",
                    timeout.unwrap_or_default()
                )));
            }
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
        if !criteria.matches(run) || stage.is_some_and(|s| s != *new_stage) {
            continue;
        }

        writeln!(
            out,
            "{}",
            transition_line(ctx.color, *timestamp, &run.instance_id, *new_stage)
        )?;
        out.flush()?;
        seen += 1;
    }

    subscription.release();
    info!(seen, wanted, "wait finished");
    Ok(seen)
}
