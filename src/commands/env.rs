// src/commands/env.rs

use std::io::Write;

use crate::cli::EnvArgs;
use crate::config::ConfigFile;
use crate::errors::{Result, TaroError};

/// Print the selected environment, or all of them with `--all`, as TOML.
pub fn run<W: Write>(
    config: &ConfigFile,
    selected: Option<&str>,
    args: &EnvArgs,
    out: &mut W,
) -> Result<()> {
    let only = if args.all {
        None
    } else {
        let env = config
            .environment(selected)
            .ok_or_else(|| TaroError::EnvironmentNotFound(selected.unwrap_or_default().to_string()))?;
        Some(env.id.as_str())
    };

    let rendered = config
        .environments_toml(only)
        .map_err(|e| TaroError::ConfigError(format!("cannot render environments: {e}")))?;
    writeln!(out, "default_env = \"{}\"", config.default_env)?;
    writeln!(out)?;
    write!(out, "{rendered}")?;
    Ok(())
}
