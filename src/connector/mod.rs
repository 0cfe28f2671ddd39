// src/connector/mod.rs

//! Environment connector abstraction.
//!
//! Every command talks to an environment through [`EnvironmentConnector`]
//! instead of a concrete transport. The backend that owns job execution,
//! storage and IPC lives outside this crate; it plugs in by implementing
//! this trait. [`memory::MemoryEnvironment`] is the in-process
//! implementation used by tests and by `type = "memory"` environments.
//!
//! Notifications are push-based: observers registered through
//! [`Notifications`] are invoked on arbitrary threads and must only hand
//! the event off. [`Subscription`] wraps registration in a guard so that
//! deregistration happens on every exit path.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::config::model::{EnvironmentConfig, EnvironmentKind};
use crate::criteria::RunCriteria;
use crate::errors::Result;
use crate::job::{InstanceEvent, InstanceId, JobInstance, JobRun, OutputTail};

pub mod memory;

pub use memory::MemoryEnvironment;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of a control operation against a single instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlResult {
    /// The operation took effect.
    Applied,
    /// The instance exists but the operation does not apply to its current
    /// state (already ended, phase not waiting, ...).
    NotApplicable,
    NotFound,
}

impl fmt::Display for ControlResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ControlResult::Applied => "APPLIED",
            ControlResult::NotApplicable => "NOT_APPLICABLE",
            ControlResult::NotFound => "NOT_FOUND",
        })
    }
}

/// Connection to one named environment.
///
/// Errors are reported as [`crate::errors::TaroError::Transport`] when a
/// single call failed and as [`crate::errors::TaroError::ConnectionLost`]
/// when the connection cannot be used anymore.
pub trait EnvironmentConnector: Send + Sync {
    fn env_id(&self) -> &str;

    /// Registry for push notifications from this environment.
    fn notifications(&self) -> Arc<dyn Notifications>;

    /// All non-ended runs matching `criteria`, as of now.
    fn get_active_runs<'a>(
        &'a self,
        criteria: &'a RunCriteria,
    ) -> BoxFuture<'a, Result<Vec<JobRun>>>;

    /// Live handle of an active instance, `None` if it is not active.
    fn get_instance<'a>(
        &'a self,
        id: &'a InstanceId,
    ) -> BoxFuture<'a, Result<Option<JobInstance>>>;

    /// Ended runs matching `criteria`, most recently created first.
    fn read_history_runs<'a>(
        &'a self,
        criteria: &'a RunCriteria,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<JobRun>>>;

    /// Recent output of active runs matching `criteria`.
    fn get_output_tail<'a>(
        &'a self,
        criteria: &'a RunCriteria,
    ) -> BoxFuture<'a, Result<Vec<OutputTail>>>;

    fn stop<'a>(&'a self, id: &'a InstanceId) -> BoxFuture<'a, Result<ControlResult>>;

    /// Release a phase waiting for approval.
    fn approve<'a>(
        &'a self,
        id: &'a InstanceId,
        phase_id: &'a str,
    ) -> BoxFuture<'a, Result<ControlResult>>;

    /// Release a phase parked at a checkpoint.
    fn resume<'a>(
        &'a self,
        id: &'a InstanceId,
        phase_id: &'a str,
    ) -> BoxFuture<'a, Result<ControlResult>>;
}

/// Open a connector for a resolved environment.
pub fn connect(env: &EnvironmentConfig) -> Result<Arc<dyn EnvironmentConnector>> {
    debug!(env = %env.id, kind = ?env.kind, "connecting to environment");
    match env.kind {
        EnvironmentKind::Memory => Ok(Arc::new(MemoryEnvironment::new(env.id.clone()))),
    }
}

/// Callback invoked for every event of an environment.
pub trait EventObserver: Send + Sync {
    fn on_event(&self, event: &InstanceEvent);
}

impl<F> EventObserver for F
where
    F: Fn(&InstanceEvent) + Send + Sync,
{
    fn on_event(&self, event: &InstanceEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

pub trait Notifications: Send + Sync {
    fn add_observer(&self, observer: Arc<dyn EventObserver>) -> ObserverId;
    fn remove_observer(&self, id: ObserverId);
}

/// Thread-safe observer registry a connector can publish through.
#[derive(Default)]
pub struct ObserverHub {
    next_id: AtomicU64,
    observers: Mutex<HashMap<ObserverId, Arc<dyn EventObserver>>>,
}

impl fmt::Debug for ObserverHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverHub")
            .field("observers", &self.observer_count())
            .finish()
    }
}

impl ObserverHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// A panic while the registry was locked leaves the map itself intact,
    /// so a poisoned lock is recovered rather than treated as empty.
    fn observers(&self) -> MutexGuard<'_, HashMap<ObserverId, Arc<dyn EventObserver>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn observer_count(&self) -> usize {
        self.observers().len()
    }

    /// Deliver `event` to every registered observer.
    ///
    /// Observers are called outside the registry lock, so an observer may
    /// itself (de)register without deadlocking.
    pub fn publish(&self, event: &InstanceEvent) {
        let observers: Vec<Arc<dyn EventObserver>> = self.observers().values().cloned().collect();
        trace!(instance = %event.instance_id(), observers = observers.len(), "publishing event");
        for observer in observers {
            observer.on_event(event);
        }
    }
}

impl Notifications for ObserverHub {
    fn add_observer(&self, observer: Arc<dyn EventObserver>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers().insert(id, observer);
        id
    }

    fn remove_observer(&self, id: ObserverId) {
        self.observers().remove(&id);
    }
}

/// Scoped observer registration. Dropping the guard deregisters.
pub struct Subscription {
    notifications: Arc<dyn Notifications>,
    id: Option<ObserverId>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Subscription {
    pub fn register(
        notifications: Arc<dyn Notifications>,
        observer: Arc<dyn EventObserver>,
    ) -> Self {
        let id = notifications.add_observer(observer);
        debug!(?id, "observer registered");
        Self {
            notifications,
            id: Some(id),
        }
    }

    /// Register an observer that only enqueues events, and return the
    /// receiving end of the queue.
    pub fn channel(
        notifications: Arc<dyn Notifications>,
    ) -> (Self, mpsc::UnboundedReceiver<InstanceEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let observer = move |event: &InstanceEvent| {
            // Receiver gone means the consumer is shutting down.
            let _ = tx.send(event.clone());
        };
        (Self::register(notifications, Arc::new(observer)), rx)
    }

    /// Deregister now instead of at scope exit.
    pub fn release(mut self) {
        self.deregister();
    }

    fn deregister(&mut self) {
        if let Some(id) = self.id.take() {
            self.notifications.remove_observer(id);
            debug!(?id, "observer removed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.deregister();
    }
}
