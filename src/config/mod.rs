// src/config/mod.rs

//! `taro.toml` loading and validation.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_config, resolve_config};
pub use model::{ConfigFile, EnvironmentConfig, EnvironmentKind};
