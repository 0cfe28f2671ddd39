// src/job.rs

//! Run snapshot model.
//!
//! Everything here is passive data as delivered by an environment: the
//! instance identity, the per-observation [`JobRun`] snapshot and the
//! [`InstanceEvent`] notifications. Presentation fields (phases, status,
//! warnings) are carried through untouched; the reconciliation engine only
//! looks at identity and stage.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Composite key of one job instance: `(job_id, run_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId {
    pub job_id: String,
    pub run_id: String,
}

impl InstanceId {
    pub fn new(job_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            run_id: run_id.into(),
        }
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.job_id, self.run_id)
    }
}

/// Coarse lifecycle position of a run. Never decreases for one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stage {
    Created,
    Running,
    Ended,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Created => "CREATED",
            Stage::Running => "RUNNING",
            Stage::Ended => "ENDED",
        };
        f.write_str(s)
    }
}

/// Broad classification of how a run terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Success,
    NonSuccess,
    Aborted,
    Rejected,
    Fault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminationStatus {
    Completed,
    Failed,
    Error,
    Stopped,
    Interrupted,
    Cancelled,
    Timeout,
    Rejected,
    Skipped,
    Unknown,
}

impl TerminationStatus {
    pub fn outcome(self) -> Outcome {
        match self {
            TerminationStatus::Completed => Outcome::Success,
            TerminationStatus::Skipped => Outcome::NonSuccess,
            TerminationStatus::Stopped
            | TerminationStatus::Interrupted
            | TerminationStatus::Cancelled => Outcome::Aborted,
            TerminationStatus::Rejected => Outcome::Rejected,
            TerminationStatus::Failed
            | TerminationStatus::Error
            | TerminationStatus::Timeout
            | TerminationStatus::Unknown => Outcome::Fault,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TerminationStatus::Completed => "COMPLETED",
            TerminationStatus::Failed => "FAILED",
            TerminationStatus::Error => "ERROR",
            TerminationStatus::Stopped => "STOPPED",
            TerminationStatus::Interrupted => "INTERRUPTED",
            TerminationStatus::Cancelled => "CANCELLED",
            TerminationStatus::Timeout => "TIMEOUT",
            TerminationStatus::Rejected => "REJECTED",
            TerminationStatus::Skipped => "SKIPPED",
            TerminationStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for TerminationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Termination {
    pub status: TerminationStatus,
    pub terminated_at: DateTime<Utc>,
}

impl Termination {
    pub fn outcome(&self) -> Outcome {
        self.status.outcome()
    }
}

/// Kind of control point a phase can be parked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlPoint {
    /// Released by `approve`.
    Approval,
    /// Released by `resume`.
    Checkpoint,
}

impl fmt::Display for ControlPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ControlPoint::Approval => "approval",
            ControlPoint::Checkpoint => "checkpoint",
        })
    }
}

/// One phase of a run's phase tree, flattened.
///
/// `waiting` is set while the phase is parked at a control point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRun {
    pub phase_id: String,
    pub stage: Stage,
    #[serde(default)]
    pub waiting: Option<ControlPoint>,
}

impl PhaseRun {
    pub fn is_waiting(&self) -> bool {
        self.waiting.is_some()
    }
}

/// Snapshot of one job instance at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRun {
    pub instance_id: InstanceId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    pub stage: Stage,
    /// Present iff `stage == Ended`.
    #[serde(default)]
    pub termination: Option<Termination>,
    #[serde(default)]
    pub phases: Vec<PhaseRun>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl JobRun {
    /// A freshly created run with no phases.
    pub fn new(instance_id: InstanceId, created_at: DateTime<Utc>) -> Self {
        Self {
            instance_id,
            created_at,
            started_at: None,
            stage: Stage::Created,
            termination: None,
            phases: Vec::new(),
            status: None,
            warnings: Vec::new(),
        }
    }

    pub fn is_ended(&self) -> bool {
        self.stage == Stage::Ended
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.termination.as_ref().map(|t| t.terminated_at)
    }

    /// Execution time: total run time for ended runs, elapsed so far otherwise.
    pub fn exec_time(&self, now: DateTime<Utc>) -> Duration {
        let start = self.started_at.unwrap_or(self.created_at);
        let end = self.ended_at().unwrap_or(now);
        (end - start).max(Duration::zero())
    }

    /// Ids of phases currently running or waiting at a control point.
    pub fn current_phases(&self) -> impl Iterator<Item = &PhaseRun> {
        self.phases
            .iter()
            .filter(|p| p.stage == Stage::Running || p.is_waiting())
    }

    pub fn find_phase(&self, phase_id: &str) -> Option<&PhaseRun> {
        self.phases.iter().find(|p| p.phase_id == phase_id)
    }
}

/// Live handle returned by an environment for an active instance.
///
/// Holds the snapshot taken when the handle was fetched; control operations
/// go through the connector by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInstance {
    run: JobRun,
}

impl JobInstance {
    pub fn new(run: JobRun) -> Self {
        Self { run }
    }

    pub fn id(&self) -> &InstanceId {
        &self.run.instance_id
    }

    pub fn snap(&self) -> &JobRun {
        &self.run
    }

    pub fn into_run(self) -> JobRun {
        self.run
    }

    /// The phase with this id if it is parked at a control point of `kind`.
    pub fn find_phase_control(&self, phase_id: &str, kind: ControlPoint) -> Option<&PhaseRun> {
        self.run
            .find_phase(phase_id)
            .filter(|p| p.waiting == Some(kind))
    }
}

/// Most recent output lines of one instance, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTail {
    pub instance_id: InstanceId,
    pub lines: Vec<String>,
}

/// Notification delivered asynchronously by an environment.
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceEvent {
    /// A phase of the run changed stage. `is_root` marks the top-level phase,
    /// whose `Ended` transition means the whole run ended.
    PhaseTransition {
        run: JobRun,
        phase_id: String,
        is_root: bool,
        new_stage: Stage,
        timestamp: DateTime<Utc>,
    },
    /// The run itself changed stage.
    LifecycleTransition {
        run: JobRun,
        new_stage: Stage,
        timestamp: DateTime<Utc>,
    },
    /// A line of output. Carries no snapshot.
    Output {
        instance_id: InstanceId,
        line: String,
    },
}

impl InstanceEvent {
    pub fn instance_id(&self) -> &InstanceId {
        match self {
            InstanceEvent::PhaseTransition { run, .. }
            | InstanceEvent::LifecycleTransition { run, .. } => &run.instance_id,
            InstanceEvent::Output { instance_id, .. } => instance_id,
        }
    }

    /// The run snapshot carried by the event, if any.
    pub fn run(&self) -> Option<&JobRun> {
        match self {
            InstanceEvent::PhaseTransition { run, .. }
            | InstanceEvent::LifecycleTransition { run, .. } => Some(run),
            InstanceEvent::Output { .. } => None,
        }
    }

    /// True only for the root-phase transition into `Ended`.
    pub fn ends_run(&self) -> bool {
        matches!(
            self,
            InstanceEvent::PhaseTransition {
                is_root: true,
                new_stage: Stage::Ended,
                ..
            }
        )
    }
}
