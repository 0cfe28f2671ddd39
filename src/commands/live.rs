// src/commands/live.rs

use crate::cli::LiveArgs;
use crate::engine::{LiveOptions, LiveRuntime, RenderSink, ShutdownSignal};
use crate::errors::Result;

use super::{criteria_from, CommandContext};

/// Effective options: config values overridden by the command line.
pub fn options_for(args: &LiveArgs, configured: LiveOptions) -> LiveOptions {
    LiveOptions {
        sort: args.sort.unwrap_or(configured.sort),
        descending: args.descending || configured.descending,
        ..configured
    }
}

/// Run the live view until `shutdown` fires or the environment is lost.
pub async fn run<R: RenderSink>(
    ctx: &CommandContext,
    args: &LiveArgs,
    configured: LiveOptions,
    renderer: R,
    shutdown: ShutdownSignal,
) -> Result<()> {
    let criteria = criteria_from(&args.filter)?;
    let options = options_for(args, configured);
    LiveRuntime::new(ctx.connector.clone(), criteria, renderer, shutdown, options)
        .run()
        .await
}
