// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::job::Stage;
use crate::types::SortOption;

/// Command-line arguments for `taro`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taro",
    version,
    about = "Observe and control job runs in a taro environment.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `TARO_CONFIG`, then `taro.toml` in the current working
    /// directory, then built-in defaults.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Environment to connect to. Defaults to `default_env` from the config.
    #[arg(short = 'e', long = "env", global = true, value_name = "NAME")]
    pub env: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TARO_LOG` or `warn` will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Disable colored output. `NO_COLOR` has the same effect.
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Continuously updated table of active and recently ended runs.
    #[command(visible_alias = "l")]
    Live(LiveArgs),

    /// Print active runs, then stream lifecycle transitions as they happen.
    Listen(PatternArgs),

    /// One-shot table of active runs.
    Ps(PatternArgs),

    /// Ended runs, most recently created first.
    #[command(visible_alias = "h")]
    History(HistoryArgs),

    /// Stop matching active runs.
    #[command(visible_alias = "x")]
    Stop(StopArgs),

    /// Approve a phase waiting for approval.
    Approve(PhaseArgs),

    /// Resume instances parked at a checkpoint phase.
    Resume(ResumeArgs),

    /// Print resolved environment configuration.
    Env(EnvArgs),

    /// Select one active run and show its detail.
    Instance(InstanceArgs),

    /// Block until matching runs reach a lifecycle stage.
    Wait(WaitArgs),

    /// Recent output of matching active runs.
    Tail(TailArgs),

    /// Per-job statistics over ended runs.
    Stats(PatternArgs),
}

/// Instance patterns: `job`, `job@run`, `job@` or `@run`.
#[derive(Debug, Clone, Args)]
pub struct PatternArgs {
    #[arg(value_name = "PATTERN")]
    pub patterns: Vec<String>,

    /// Pattern matching strategy.
    #[arg(long, value_enum, default_value_t = MatchArg::Partial)]
    pub matching: MatchArg,
}

#[derive(Debug, Clone, Args)]
pub struct LiveArgs {
    #[command(flatten)]
    pub filter: PatternArgs,

    /// Sort column. Defaults to `[live].sort` from the config.
    #[arg(short = 's', long, value_enum)]
    pub sort: Option<SortOption>,

    /// Reverse the sort order.
    #[arg(short = 'd', long)]
    pub descending: bool,
}

#[derive(Debug, Clone, Args)]
pub struct HistoryArgs {
    #[command(flatten)]
    pub filter: PatternArgs,

    /// Maximum number of runs to print.
    #[arg(short = 'n', long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Debug, Clone, Args)]
pub struct StopArgs {
    #[arg(value_name = "PATTERN", required = true)]
    pub patterns: Vec<String>,

    /// Do not ask for confirmation.
    #[arg(short = 'f', long)]
    pub force: bool,
}

#[derive(Debug, Clone, Args)]
pub struct PhaseArgs {
    #[arg(value_name = "PATTERN", required = true)]
    pub patterns: Vec<String>,

    #[arg(short = 'p', long = "phase", value_name = "ID")]
    pub phase_id: String,
}

#[derive(Debug, Clone, Args)]
pub struct ResumeArgs {
    #[command(flatten)]
    pub target: PhaseArgs,

    /// Do not ask for confirmation.
    #[arg(short = 'f', long)]
    pub force: bool,
}

#[derive(Debug, Clone, Args)]
pub struct EnvArgs {
    /// Print every configured environment, not only the selected one.
    #[arg(short = 'a', long)]
    pub all: bool,
}

#[derive(Debug, Clone, Args)]
pub struct InstanceArgs {
    #[arg(value_name = "PATTERN")]
    pub pattern: String,

    /// Row to pick when several runs match (0-based, in table order).
    #[arg(short = 'i', long, default_value_t = 0)]
    pub index: usize,
}

#[derive(Debug, Clone, Args)]
pub struct WaitArgs {
    #[command(flatten)]
    pub filter: PatternArgs,

    /// Stage to wait for. Any transition counts when omitted.
    #[arg(short = 's', long, value_enum)]
    pub stage: Option<StageArg>,

    /// Number of matching transitions to wait for.
    #[arg(short = 'c', long, default_value_t = 1)]
    pub count: usize,

    /// Give up after this long, e.g. `30s` or `5m`.
    #[arg(short = 't', long, value_parser = crate::types::parse_duration)]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Args)]
pub struct TailArgs {
    #[command(flatten)]
    pub filter: PatternArgs,

    /// Keep printing new output lines until interrupted.
    #[arg(short = 'f', long)]
    pub follow: bool,
}

/// Lifecycle stage as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum StageArg {
    Created,
    Running,
    Ended,
}

impl From<StageArg> for Stage {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::Created => Stage::Created,
            StageArg::Running => Stage::Running,
            StageArg::Ended => Stage::Ended,
        }
    }
}

/// Matching strategy as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum MatchArg {
    Exact,
    Partial,
    #[value(name = "fn_match", alias = "glob")]
    FnMatch,
}

impl From<MatchArg> for crate::types::MatchingStrategy {
    fn from(arg: MatchArg) -> Self {
        match arg {
            MatchArg::Exact => Self::Exact,
            MatchArg::Partial => Self::Partial,
            MatchArg::FnMatch => Self::FnMatch,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
