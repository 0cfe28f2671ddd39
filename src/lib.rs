// src/lib.rs

pub mod cli;
pub mod commands;
pub mod config;
pub mod connector;
pub mod criteria;
pub mod engine;
pub mod errors;
pub mod job;
pub mod logging;
pub mod types;
pub mod view;

use std::io;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::commands::{
    control, env, history, instance, listen, live, ps, stats, tail, wait, CommandContext,
};
use crate::config::{load_config, ConfigFile};
use crate::connector::{connect, EnvironmentConnector};
use crate::engine::shutdown_channel;
use crate::errors::TaroError;
use crate::view::{color_enabled, TerminalRenderer};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - environment selection and connection
/// - Ctrl-C handling for the long-running commands
/// - dispatch to the subcommand
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let color = color_enabled(args.no_color);
    let mut stdout = io::stdout();

    if let Command::Env(env_args) = &args.command {
        env::run(&cfg, args.env.as_deref(), env_args, &mut stdout)?;
        return Ok(());
    }

    let ctx = CommandContext::new(open_environment(&cfg, args.env.as_deref())?, color);
    debug!(?ctx, "environment connected");

    match &args.command {
        Command::Live(live_args) => {
            let (handle, signal) = shutdown_channel();
            handle.trigger_on_ctrl_c();
            let renderer = TerminalRenderer::new(io::stdout(), color);
            live::run(&ctx, live_args, cfg.live, renderer, signal).await?;
        }
        Command::Listen(pattern_args) => {
            let (handle, signal) = shutdown_channel();
            handle.trigger_on_ctrl_c();
            let printed = listen::run(&ctx, pattern_args, signal, &mut stdout).await?;
            info!(printed, "listen finished");
        }
        Command::Ps(pattern_args) => ps::run(&ctx, pattern_args, &mut stdout).await?,
        Command::History(history_args) => history::run(&ctx, history_args, &mut stdout).await?,
        Command::Stop(stop_args) => {
            control::stop(&ctx, stop_args, &mut io::stdin().lock(), &mut stdout).await?;
        }
        Command::Approve(phase_args) => {
            control::approve(&ctx, phase_args, &mut stdout).await?;
        }
        Command::Resume(resume_args) => {
            control::resume(&ctx, resume_args, &mut io::stdin().lock(), &mut stdout).await?;
        }
        Command::Instance(instance_args) => {
            instance::run(&ctx, instance_args, &mut stdout).await?;
        }
        Command::Wait(wait_args) => {
            let (handle, signal) = shutdown_channel();
            handle.trigger_on_ctrl_c();
            let seen = wait::run(&ctx, wait_args, signal, &mut stdout).await?;
            info!(seen, "wait finished");
        }
        Command::Tail(tail_args) => {
            let (handle, signal) = shutdown_channel();
            if tail_args.follow {
                handle.trigger_on_ctrl_c();
            }
            let printed = tail::run(&ctx, tail_args, signal, &mut stdout).await?;
            debug!(printed, "tail finished");
        }
        Command::Stats(pattern_args) => stats::run(&ctx, pattern_args, &mut stdout).await?,
        Command::Env(_) => {}
    }

    Ok(())
}

fn open_environment(
    cfg: &ConfigFile,
    selected: Option<&str>,
) -> errors::Result<Arc<dyn EnvironmentConnector>> {
    let env = cfg.environment(selected).ok_or_else(|| {
        TaroError::EnvironmentNotFound(selected.unwrap_or(&cfg.default_env).to_string())
    })?;
    connect(env)
}
