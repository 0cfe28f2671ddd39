// src/connector/memory.rs

//! In-process environment.
//!
//! Keeps runs in memory and emits the same notifications a real backend
//! would for each transition. Besides `type = "memory"` environments it is
//! the backbone of the integration tests, so it also supports failure
//! injection: transient poll and fetch failures, silent disappearance
//! (crash) and permanent connection loss.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info};

use crate::criteria::RunCriteria;
use crate::errors::{Result, TaroError};
use crate::job::{
    ControlPoint, InstanceEvent, InstanceId, JobInstance, JobRun, OutputTail, PhaseRun, Stage,
    Termination, TerminationStatus,
};

use super::{BoxFuture, ControlResult, EnvironmentConnector, Notifications, ObserverHub};

/// Phase id given to the root phase of every run.
pub const ROOT_PHASE_ID: &str = "root";

/// Output lines kept per active instance.
pub const OUTPUT_TAIL_LINES: usize = 100;

#[derive(Debug, Default)]
struct MemoryState {
    active: BTreeMap<InstanceId, JobRun>,
    history: Vec<JobRun>,
    output: BTreeMap<InstanceId, VecDeque<String>>,
    failing_polls: usize,
    failing_fetches: usize,
    disconnected: bool,
}

#[derive(Debug)]
pub struct MemoryEnvironment {
    env_id: String,
    state: Mutex<MemoryState>,
    hub: Arc<ObserverHub>,
}

impl MemoryEnvironment {
    pub fn new(env_id: impl Into<String>) -> Self {
        Self {
            env_id: env_id.into(),
            state: Mutex::new(MemoryState::default()),
            hub: Arc::new(ObserverHub::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panicking test thread must not wedge the other observers.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn observer_count(&self) -> usize {
        self.hub.observer_count()
    }

    /// Publish an arbitrary event, bypassing the run table. Used to replay
    /// late or duplicated deliveries.
    pub fn publish(&self, event: InstanceEvent) {
        self.hub.publish(&event);
    }

    /// Seed a run without emitting any event. Ended runs go to history.
    pub fn insert(&self, run: JobRun) {
        let mut state = self.lock();
        if run.is_ended() {
            state.history.push(run);
        } else {
            state.active.insert(run.instance_id.clone(), run);
        }
    }

    /// Register a new instance in `Created` stage.
    pub fn create(&self, job_id: &str, run_id: &str) -> JobRun {
        let id = InstanceId::new(job_id, run_id);
        let mut run = JobRun::new(id.clone(), Utc::now());
        run.phases.push(PhaseRun {
            phase_id: ROOT_PHASE_ID.to_string(),
            stage: Stage::Created,
            waiting: None,
        });
        self.lock().active.insert(id, run.clone());

        self.hub.publish(&InstanceEvent::LifecycleTransition {
            run: run.clone(),
            new_stage: Stage::Created,
            timestamp: Utc::now(),
        });
        run
    }

    /// Move an instance to `Running`.
    pub fn start(&self, id: &InstanceId) -> Option<JobRun> {
        let now = Utc::now();
        let run = self.modify(id, |run| {
            run.stage = Stage::Running;
            run.started_at = Some(now);
            set_phase_stage(run, ROOT_PHASE_ID, Stage::Running);
        })?;

        self.publish_phase(&run, ROOT_PHASE_ID, true, Stage::Running);
        self.hub.publish(&InstanceEvent::LifecycleTransition {
            run: run.clone(),
            new_stage: Stage::Running,
            timestamp: now,
        });
        Some(run)
    }

    /// Enter a nested phase, parked at `control` when given.
    pub fn enter_phase(
        &self,
        id: &InstanceId,
        phase_id: &str,
        control: Option<ControlPoint>,
    ) -> Option<JobRun> {
        let run = self.modify(id, |run| {
            run.phases.retain(|p| p.phase_id != phase_id);
            run.phases.push(PhaseRun {
                phase_id: phase_id.to_string(),
                stage: if control.is_some() { Stage::Created } else { Stage::Running },
                waiting: control,
            });
        })?;
        let stage = run.find_phase(phase_id).map(|p| p.stage).unwrap_or(Stage::Running);
        self.publish_phase(&run, phase_id, false, stage);
        Some(run)
    }

    /// Change the status text. Status updates travel as output, so observers
    /// only see the new text on their next poll.
    pub fn update_status(&self, id: &InstanceId, status: &str) -> Option<JobRun> {
        let run = self.modify(id, |run| run.status = Some(status.to_string()))?;
        self.record_output(id, status);
        Some(run)
    }

    /// Emit a line of output without touching the status. Returns `false`
    /// when the instance is not active.
    pub fn print(&self, id: &InstanceId, line: &str) -> bool {
        if !self.lock().active.contains_key(id) {
            return false;
        }
        self.record_output(id, line);
        true
    }

    fn record_output(&self, id: &InstanceId, line: &str) {
        {
            let mut state = self.lock();
            let tail = state.output.entry(id.clone()).or_default();
            if tail.len() == OUTPUT_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line.to_string());
        }
        self.hub.publish(&InstanceEvent::Output {
            instance_id: id.clone(),
            line: line.to_string(),
        });
    }

    /// Terminate an instance: emits the root-phase `Ended` transition
    /// followed by the lifecycle transition.
    pub fn end(&self, id: &InstanceId, status: TerminationStatus) -> Option<JobRun> {
        let now = Utc::now();
        let run = {
            let mut state = self.lock();
            let mut run = state.active.remove(id)?;
            state.output.remove(id);
            run.stage = Stage::Ended;
            run.termination = Some(Termination {
                status,
                terminated_at: now,
            });
            for phase in run.phases.iter_mut() {
                phase.stage = Stage::Ended;
                phase.waiting = None;
            }
            state.history.push(run.clone());
            run
        };

        debug!(instance = %id, %status, "memory instance ended");
        self.publish_phase(&run, ROOT_PHASE_ID, true, Stage::Ended);
        self.hub.publish(&InstanceEvent::LifecycleTransition {
            run: run.clone(),
            new_stage: Stage::Ended,
            timestamp: now,
        });
        Some(run)
    }

    /// Drop an instance without any event, as a crashed process would.
    pub fn vanish(&self, id: &InstanceId) -> Option<JobRun> {
        let removed = {
            let mut state = self.lock();
            state.output.remove(id);
            state.active.remove(id)
        };
        if removed.is_some() {
            info!(instance = %id, "memory instance vanished");
        }
        removed
    }

    /// Make the next `n` calls to `get_active_runs` fail with a transport error.
    pub fn fail_next_polls(&self, n: usize) {
        self.lock().failing_polls = n;
    }

    /// Make the next `n` calls to `get_instance` fail with a transport error.
    pub fn fail_next_instance_fetches(&self, n: usize) {
        self.lock().failing_fetches = n;
    }

    /// Sever the connection; every subsequent call fails fatally.
    pub fn disconnect(&self) {
        self.lock().disconnected = true;
    }

    fn modify(&self, id: &InstanceId, f: impl FnOnce(&mut JobRun)) -> Option<JobRun> {
        let mut state = self.lock();
        let run = state.active.get_mut(id)?;
        f(run);
        Some(run.clone())
    }

    fn publish_phase(&self, run: &JobRun, phase_id: &str, is_root: bool, new_stage: Stage) {
        self.hub.publish(&InstanceEvent::PhaseTransition {
            run: run.clone(),
            phase_id: phase_id.to_string(),
            is_root,
            new_stage,
            timestamp: Utc::now(),
        });
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.lock().disconnected {
            return Err(TaroError::ConnectionLost(format!(
                "memory environment '{}' disconnected",
                self.env_id
            )));
        }
        Ok(())
    }

    /// Release `phase_id` if it is parked at a control point of `kind`.
    fn release_phase(
        &self,
        id: &InstanceId,
        phase_id: &str,
        kind: ControlPoint,
    ) -> Result<ControlResult> {
        self.ensure_connected()?;

        let released = {
            let mut state = self.lock();
            if !state.active.contains_key(id) {
                let ended = state.history.iter().any(|r| &r.instance_id == id);
                return Ok(if ended {
                    ControlResult::NotApplicable
                } else {
                    ControlResult::NotFound
                });
            }
            let Some(run) = state.active.get_mut(id) else {
                return Ok(ControlResult::NotFound);
            };
            match run
                .phases
                .iter_mut()
                .find(|p| p.phase_id == phase_id && p.waiting == Some(kind))
            {
                Some(phase) => {
                    phase.waiting = None;
                    phase.stage = Stage::Running;
                    Some(run.clone())
                }
                None => None,
            }
        };

        match released {
            Some(run) => {
                debug!(instance = %id, phase = phase_id, %kind, "control point released");
                self.publish_phase(&run, phase_id, false, Stage::Running);
                Ok(ControlResult::Applied)
            }
            None => Ok(ControlResult::NotApplicable),
        }
    }
}

fn set_phase_stage(run: &mut JobRun, phase_id: &str, stage: Stage) {
    if let Some(phase) = run.phases.iter_mut().find(|p| p.phase_id == phase_id) {
        phase.stage = stage;
    }
}

impl EnvironmentConnector for MemoryEnvironment {
    fn env_id(&self) -> &str {
        &self.env_id
    }

    fn notifications(&self) -> Arc<dyn Notifications> {
        self.hub.clone()
    }

    fn get_active_runs<'a>(
        &'a self,
        criteria: &'a RunCriteria,
    ) -> BoxFuture<'a, Result<Vec<JobRun>>> {
        Box::pin(async move {
            self.ensure_connected()?;
            let mut state = self.lock();
            if state.failing_polls > 0 {
                state.failing_polls -= 1;
                return Err(TaroError::Transport(format!(
                    "injected poll failure in '{}'",
                    self.env_id
                )));
            }
            Ok(state
                .active
                .values()
                .filter(|run| criteria.matches(run))
                .cloned()
                .collect())
        })
    }

    fn get_instance<'a>(
        &'a self,
        id: &'a InstanceId,
    ) -> BoxFuture<'a, Result<Option<JobInstance>>> {
        Box::pin(async move {
            self.ensure_connected()?;
            let mut state = self.lock();
            if state.failing_fetches > 0 {
                state.failing_fetches -= 1;
                return Err(TaroError::Transport(format!(
                    "injected instance fetch failure in '{}'",
                    self.env_id
                )));
            }
            Ok(state.active.get(id).cloned().map(JobInstance::new))
        })
    }

    fn get_output_tail<'a>(
        &'a self,
        criteria: &'a RunCriteria,
    ) -> BoxFuture<'a, Result<Vec<OutputTail>>> {
        Box::pin(async move {
            self.ensure_connected()?;
            let state = self.lock();
            Ok(state
                .active
                .values()
                .filter(|run| criteria.matches(run))
                .map(|run| OutputTail {
                    instance_id: run.instance_id.clone(),
                    lines: state
                        .output
                        .get(&run.instance_id)
                        .map(|tail| tail.iter().cloned().collect())
                        .unwrap_or_default(),
                })
                .collect())
        })
    }

    fn read_history_runs<'a>(
        &'a self,
        criteria: &'a RunCriteria,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<JobRun>>> {
        Box::pin(async move {
            self.ensure_connected()?;
            let mut runs: Vec<JobRun> = self
                .lock()
                .history
                .iter()
                .filter(|run| criteria.matches(run))
                .cloned()
                .collect();
            runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            runs.truncate(limit);
            Ok(runs)
        })
    }

    fn stop<'a>(&'a self, id: &'a InstanceId) -> BoxFuture<'a, Result<ControlResult>> {
        Box::pin(async move {
            self.ensure_connected()?;
            if self.end(id, TerminationStatus::Stopped).is_some() {
                return Ok(ControlResult::Applied);
            }
            let ended = self.lock().history.iter().any(|r| &r.instance_id == id);
            Ok(if ended {
                ControlResult::NotApplicable
            } else {
                ControlResult::NotFound
            })
        })
    }

    fn approve<'a>(
        &'a self,
        id: &'a InstanceId,
        phase_id: &'a str,
    ) -> BoxFuture<'a, Result<ControlResult>> {
        Box::pin(async move { self.release_phase(id, phase_id, ControlPoint::Approval) })
    }

    fn resume<'a>(
        &'a self,
        id: &'a InstanceId,
        phase_id: &'a str,
    ) -> BoxFuture<'a, Result<ControlResult>> {
        Box::pin(async move { self.release_phase(id, phase_id, ControlPoint::Checkpoint) })
    }
}
