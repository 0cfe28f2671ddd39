// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::LiveOptions;

/// Name of the environment used when nothing else is configured.
pub const DEFAULT_ENV_ID: &str = "local";

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// default_env = "local"
///
/// [live]
/// retention = "10s"
/// grace = "5s"
/// poll = "tick"
/// call_timeout = "10s"
///
/// [env.local]
/// type = "memory"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub default_env: Option<String>,

    /// `[live]` section.
    #[serde(default)]
    pub live: RawLiveSection,

    /// All environments from `[env.<name>]`.
    #[serde(default)]
    pub env: BTreeMap<String, RawEnvironment>,
}

/// `[live]` section. Durations are kept as strings until validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawLiveSection {
    #[serde(default = "default_retention")]
    pub retention: String,

    #[serde(default = "default_grace")]
    pub grace: String,

    #[serde(default = "default_first_event_wait")]
    pub first_event_wait: String,

    /// `"tick"` or a heartbeat duration.
    #[serde(default = "default_poll")]
    pub poll: String,

    /// Bound on one environment call made by the live loop.
    #[serde(default = "default_call_timeout")]
    pub call_timeout: String,

    #[serde(default)]
    pub sort: crate::types::SortOption,

    #[serde(default)]
    pub descending: bool,
}

fn default_retention() -> String {
    "10s".to_string()
}

fn default_grace() -> String {
    "5s".to_string()
}

fn default_first_event_wait() -> String {
    "1s".to_string()
}

fn default_poll() -> String {
    "tick".to_string()
}

fn default_call_timeout() -> String {
    "10s".to_string()
}

impl Default for RawLiveSection {
    fn default() -> Self {
        Self {
            retention: default_retention(),
            grace: default_grace(),
            first_event_wait: default_first_event_wait(),
            poll: default_poll(),
            call_timeout: default_call_timeout(),
            sort: Default::default(),
            descending: false,
        }
    }
}

/// `[env.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEnvironment {
    #[serde(rename = "type")]
    pub kind: EnvironmentKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentKind {
    /// In-process environment, see [`crate::connector::MemoryEnvironment`].
    Memory,
}

/// A resolved environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentConfig {
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EnvironmentKind,
}

/// Validated configuration.
///
/// Constructed from [`RawConfigFile`] via `TryFrom` (see `validate.rs`), so
/// holding one means every duration parsed and every cross-field rule held.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub default_env: String,
    pub live: LiveOptions,
    pub environments: BTreeMap<String, EnvironmentConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        default_env: String,
        live: LiveOptions,
        environments: BTreeMap<String, EnvironmentConfig>,
    ) -> Self {
        Self {
            default_env,
            live,
            environments,
        }
    }

    /// Look up `name`, or the default environment when `None`.
    pub fn environment(&self, name: Option<&str>) -> Option<&EnvironmentConfig> {
        self.environments.get(name.unwrap_or(&self.default_env))
    }

    /// Render environments back to TOML for `taro env`.
    pub fn environments_toml(&self, only: Option<&str>) -> std::result::Result<String, toml::ser::Error> {
        let selected: BTreeMap<&str, &EnvironmentConfig> = self
            .environments
            .iter()
            .filter(|(id, _)| only.is_none_or(|o| o == id.as_str()))
            .map(|(id, env)| (id.as_str(), env))
            .collect();

        #[derive(Serialize)]
        struct EnvTable<'a> {
            env: BTreeMap<&'a str, &'a EnvironmentConfig>,
        }

        toml::to_string(&EnvTable { env: selected })
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        let env = EnvironmentConfig {
            id: DEFAULT_ENV_ID.to_string(),
            kind: EnvironmentKind::Memory,
        };
        Self {
            default_env: DEFAULT_ENV_ID.to_string(),
            live: LiveOptions::default(),
            environments: BTreeMap::from([(DEFAULT_ENV_ID.to_string(), env)]),
        }
    }
}

/// Upper bound for `[live].first_event_wait`; a longer wait makes the view
/// feel frozen.
pub const MAX_FIRST_EVENT_WAIT: Duration = Duration::from_secs(5);
