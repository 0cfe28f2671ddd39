// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaroError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid instance pattern: {0}")]
    InvalidPattern(String),

    #[error("Environment not found: {0}")]
    EnvironmentNotFound(String),

    /// A single RPC against the environment failed; the connection itself is
    /// still usable.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The connection to the environment is gone for good.
    #[error("Connection to environment lost: {0}")]
    ConnectionLost(String),

    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaroError {
    /// Whether this error must stop a live loop instead of being logged and
    /// skipped for the current tick.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TaroError::ConnectionLost(_))
    }
}

pub type Result<T> = std::result::Result<T, TaroError>;
