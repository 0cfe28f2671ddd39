// src/commands/mod.rs

//! Subcommand implementations.
//!
//! Commands write to a caller-supplied writer and read confirmations from a
//! caller-supplied reader, so integration tests can drive them against a
//! memory environment without a terminal.

use std::io::{BufRead, Write};
use std::sync::Arc;

use crate::cli::PatternArgs;
use crate::connector::EnvironmentConnector;
use crate::criteria::RunCriteria;
use crate::errors::Result;
use crate::types::MatchingStrategy;

pub mod control;
pub mod env;
pub mod history;
pub mod instance;
pub mod listen;
pub mod live;
pub mod ps;
pub mod stats;
pub mod tail;
pub mod wait;

/// What every connected command needs.
#[derive(Clone)]
pub struct CommandContext {
    pub connector: Arc<dyn EnvironmentConnector>,
    pub color: bool,
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("env", &self.connector.env_id())
            .field("color", &self.color)
            .finish()
    }
}

impl CommandContext {
    pub fn new(connector: Arc<dyn EnvironmentConnector>, color: bool) -> Self {
        Self { connector, color }
    }
}

pub(crate) fn criteria_from(args: &PatternArgs) -> Result<RunCriteria> {
    RunCriteria::parse_all(args.patterns.iter().map(String::as_str), args.matching.into())
}

/// Criteria for commands that act on instances. Patterns are globs there.
pub(crate) fn target_criteria(patterns: &[String]) -> Result<RunCriteria> {
    RunCriteria::parse_all(patterns.iter().map(String::as_str), MatchingStrategy::FnMatch)
}

/// Ask `Do you want to continue? [Y/n]`. An empty answer means yes; a
/// closed input means no.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<bool> {
    write!(out, "Do you want to continue? [Y/n] ")?;
    out.flush()?;

    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        writeln!(out)?;
        return Ok(false);
    }
    Ok(matches!(
        answer.trim().to_lowercase().as_str(),
        "" | "y" | "yes" | "true" | "1"
    ))
}
