#![allow(dead_code)]

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use taro::config::model::{RawConfigFile, RawEnvironment, RawLiveSection};
use taro::config::{ConfigFile, EnvironmentKind};
use taro::connector::memory::ROOT_PHASE_ID;
use taro::job::{
    ControlPoint, InstanceEvent, InstanceId, JobRun, PhaseRun, Stage, Termination, TerminationStatus,
};

/// Fixed reference time so tables and sort orders are deterministic.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
}

pub fn id(job: &str, run: &str) -> InstanceId {
    InstanceId::new(job, run)
}

/// Builder for `JobRun` snapshots.
pub struct JobRunBuilder {
    run: JobRun,
}

impl JobRunBuilder {
    pub fn new(job: &str, run: &str) -> Self {
        let mut snapshot = JobRun::new(id(job, run), base_time());
        snapshot.phases.push(PhaseRun {
            phase_id: ROOT_PHASE_ID.to_string(),
            stage: Stage::Created,
            waiting: None,
        });
        Self { run: snapshot }
    }

    /// Created `secs` seconds after [`base_time`].
    pub fn created_after(mut self, secs: i64) -> Self {
        self.run.created_at = base_time() + Duration::seconds(secs);
        self
    }

    pub fn running(mut self) -> Self {
        self.run.stage = Stage::Running;
        self.run.started_at = Some(self.run.created_at);
        for phase in self.run.phases.iter_mut() {
            phase.stage = Stage::Running;
        }
        self
    }

    /// Ended `secs` seconds after creation.
    pub fn ended(mut self, status: TerminationStatus, secs: i64) -> Self {
        self.run.stage = Stage::Ended;
        self.run.termination = Some(Termination {
            status,
            terminated_at: self.run.created_at + Duration::seconds(secs),
        });
        for phase in self.run.phases.iter_mut() {
            phase.stage = Stage::Ended;
            phase.waiting = None;
        }
        self
    }

    pub fn waiting_phase(mut self, phase_id: &str, control: ControlPoint) -> Self {
        self.run.phases.push(PhaseRun {
            phase_id: phase_id.to_string(),
            stage: Stage::Created,
            waiting: Some(control),
        });
        self
    }

    pub fn status(mut self, text: &str) -> Self {
        self.run.status = Some(text.to_string());
        self
    }

    pub fn warning(mut self, text: &str) -> Self {
        self.run.warnings.push(text.to_string());
        self
    }

    pub fn build(self) -> JobRun {
        self.run
    }
}

/// Root-phase transition into `Ended`: the only event that ends a run.
pub fn root_ended(run: &JobRun) -> InstanceEvent {
    let mut run = run.clone();
    if !run.is_ended() {
        run = JobRunBuilder { run }.ended(TerminationStatus::Completed, 1).build();
    }
    InstanceEvent::PhaseTransition {
        timestamp: run.ended_at().unwrap_or_else(base_time),
        run,
        phase_id: ROOT_PHASE_ID.to_string(),
        is_root: true,
        new_stage: Stage::Ended,
    }
}

/// Non-root phase transition carrying `run` as its snapshot.
pub fn phase_event(run: &JobRun, phase_id: &str, new_stage: Stage) -> InstanceEvent {
    InstanceEvent::PhaseTransition {
        run: run.clone(),
        phase_id: phase_id.to_string(),
        is_root: false,
        new_stage,
        timestamp: base_time(),
    }
}

pub fn lifecycle_event(run: &JobRun) -> InstanceEvent {
    InstanceEvent::LifecycleTransition {
        run: run.clone(),
        new_stage: run.stage,
        timestamp: base_time(),
    }
}

pub fn output_event(id: &InstanceId, line: &str) -> InstanceEvent {
    InstanceEvent::Output {
        instance_id: id.clone(),
        line: line.to_string(),
    }
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                default_env: None,
                live: RawLiveSection::default(),
                env: BTreeMap::new(),
            },
        }
    }

    pub fn with_memory_env(mut self, name: &str) -> Self {
        self.config.env.insert(
            name.to_string(),
            RawEnvironment {
                kind: EnvironmentKind::Memory,
            },
        );
        self
    }

    pub fn default_env(mut self, name: &str) -> Self {
        self.config.default_env = Some(name.to_string());
        self
    }

    pub fn retention(mut self, value: &str) -> Self {
        self.config.live.retention = value.to_string();
        self
    }

    pub fn grace(mut self, value: &str) -> Self {
        self.config.live.grace = value.to_string();
        self
    }

    pub fn poll(mut self, value: &str) -> Self {
        self.config.live.poll = value.to_string();
        self
    }

    pub fn first_event_wait(mut self, value: &str) -> Self {
        self.config.live.first_event_wait = value.to_string();
        self
    }

    pub fn call_timeout(mut self, value: &str) -> Self {
        self.config.live.call_timeout = value.to_string();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
