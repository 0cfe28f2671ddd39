// src/config/validate.rs

use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::model::{
    ConfigFile, EnvironmentConfig, EnvironmentKind, RawConfigFile, RawLiveSection,
    DEFAULT_ENV_ID, MAX_FIRST_EVENT_WAIT,
};
use crate::engine::{LiveOptions, RetentionPolicy, DEFAULT_MAX_BURST};
use crate::errors::{Result, TaroError};
use crate::types::{parse_duration, PollStrategy};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = TaroError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let live = validate_live(&raw.live)?;
        let environments = resolve_environments(&raw);
        let default_env = validate_default_env(&raw, &environments)?;
        Ok(ConfigFile::new_unchecked(default_env, live, environments))
    }
}

fn validate_live(live: &RawLiveSection) -> Result<LiveOptions> {
    let retention_window = live_duration("retention", &live.retention)?;
    let grace_window = live_duration("grace", &live.grace)?;
    let first_event_wait = live_duration("first_event_wait", &live.first_event_wait)?;
    let call_timeout = live_duration("call_timeout", &live.call_timeout)?;

    if first_event_wait > MAX_FIRST_EVENT_WAIT {
        return Err(TaroError::ConfigError(format!(
            "[live].first_event_wait must be at most {}s (got {})",
            MAX_FIRST_EVENT_WAIT.as_secs(),
            live.first_event_wait
        )));
    }

    let poll: PollStrategy = live
        .poll
        .parse()
        .map_err(|e| TaroError::ConfigError(format!("[live].poll: {e}")))?;

    if let PollStrategy::Interval(interval) = poll {
        if interval.is_zero() {
            return Err(TaroError::ConfigError(
                "[live].poll interval must be > 0; use \"tick\" to poll every tick".to_string(),
            ));
        }
        // A heartbeat run is only confirmed once per interval; a shorter
        // grace would evict healthy runs between two polls.
        if grace_window <= interval {
            return Err(TaroError::ConfigError(format!(
                "[live].grace ({}) must be longer than the poll interval ({})",
                live.grace, live.poll
            )));
        }
    }

    Ok(LiveOptions {
        policy: RetentionPolicy {
            retention_window,
            grace_window,
        },
        poll,
        first_event_wait,
        call_timeout,
        max_burst: DEFAULT_MAX_BURST,
        sort: live.sort,
        descending: live.descending,
    })
}

fn live_duration(key: &str, value: &str) -> Result<Duration> {
    let duration =
        parse_duration(value).map_err(|e| TaroError::ConfigError(format!("[live].{key}: {e}")))?;
    if duration.is_zero() {
        return Err(TaroError::ConfigError(format!(
            "[live].{key} must be > 0 (got {value})"
        )));
    }
    Ok(duration)
}

fn resolve_environments(cfg: &RawConfigFile) -> BTreeMap<String, EnvironmentConfig> {
    if cfg.env.is_empty() {
        return BTreeMap::from([(
            DEFAULT_ENV_ID.to_string(),
            EnvironmentConfig {
                id: DEFAULT_ENV_ID.to_string(),
                kind: EnvironmentKind::Memory,
            },
        )]);
    }

    cfg.env
        .iter()
        .map(|(id, env)| {
            (
                id.clone(),
                EnvironmentConfig {
                    id: id.clone(),
                    kind: env.kind,
                },
            )
        })
        .collect()
}

fn validate_default_env(
    cfg: &RawConfigFile,
    environments: &BTreeMap<String, EnvironmentConfig>,
) -> Result<String> {
    match &cfg.default_env {
        Some(name) if environments.contains_key(name) => Ok(name.clone()),
        Some(name) => Err(TaroError::ConfigError(format!(
            "default_env '{name}' has no [env.{name}] section"
        ))),
        None if environments.len() == 1 => Ok(environments.keys().next().cloned().unwrap_or_default()),
        None if environments.contains_key(DEFAULT_ENV_ID) => Ok(DEFAULT_ENV_ID.to_string()),
        None => Err(TaroError::ConfigError(
            "default_env must be set when several environments are declared".to_string(),
        )),
    }
}
