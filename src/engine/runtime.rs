// src/engine/runtime.rs

use std::fmt;
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::connector::{EnvironmentConnector, Subscription};
use crate::criteria::RunCriteria;
use crate::engine::store::ReconciliationStore;
use crate::errors::{Result, TaroError};
use crate::job::InstanceEvent;

use super::core::LiveCore;
use super::drain::EventDrain;
use super::render::RenderSink;
use super::shutdown::ShutdownSignal;
use super::{CoreCommand, LiveOptions};

/// Drives the live view: drains notifications, polls the environment,
/// sweeps the store and hands one frame per tick to a [`RenderSink`].
///
/// This is the IO shell around [`LiveCore`], which holds all the
/// reconciliation semantics.
pub struct LiveRuntime<C, R>
where
    C: EnvironmentConnector + ?Sized,
    R: RenderSink,
{
    core: LiveCore,
    connector: Arc<C>,
    renderer: R,
    shutdown: ShutdownSignal,
    options: LiveOptions,
}

impl<C, R> fmt::Debug for LiveRuntime<C, R>
where
    C: EnvironmentConnector + ?Sized,
    R: RenderSink,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveRuntime")
            .field("core", &self.core)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<C, R> LiveRuntime<C, R>
where
    C: EnvironmentConnector + ?Sized,
    R: RenderSink,
{
    pub fn new(
        connector: Arc<C>,
        criteria: RunCriteria,
        renderer: R,
        shutdown: ShutdownSignal,
        options: LiveOptions,
    ) -> Self {
        let store = ReconciliationStore::new(criteria, options.policy)
            .with_order(options.sort, options.descending);
        let core = LiveCore::new(connector.env_id(), store, options.poll);
        Self {
            core,
            connector,
            renderer,
            shutdown,
            options,
        }
    }

    /// Run until shutdown is triggered or a fatal error occurs.
    ///
    /// The observer is registered before the first poll, so no transition
    /// between the two can be lost. It is removed and the renderer finished
    /// on every exit path.
    pub async fn run(mut self) -> Result<()> {
        info!(env = %self.core.env_id(), criteria = %self.core.store().criteria(), "live view started");

        let (subscription, rx) = Subscription::channel(self.connector.notifications());
        let outcome = self.drive(rx).await;
        subscription.release();

        let finished = self.renderer.finish();
        info!(ok = outcome.is_ok(), "live view exiting");
        outcome?;
        finished
    }

    async fn drive(&mut self, rx: mpsc::UnboundedReceiver<InstanceEvent>) -> Result<()> {
        let mut drain =
            EventDrain::new(rx, self.options.first_event_wait).with_max_burst(self.options.max_burst);

        if self.refresh().await?.is_break() {
            return Ok(());
        }

        loop {
            let events = tokio::select! {
                biased;
                _ = self.shutdown.wait() => {
                    debug!("shutdown requested");
                    break;
                }
                batch = drain.next_batch() => batch,
            };

            let step = self.core.apply_events(events, now());
            for command in step.commands {
                if self.execute_command(command).await?.is_break() {
                    return Ok(());
                }
            }
            if self.refresh().await?.is_break() {
                break;
            }
        }

        Ok(())
    }

    /// Poll when due, sweep, then render. Ends every tick.
    async fn refresh(&mut self) -> Result<ControlFlow<()>> {
        if self.core.poll_due(now()) {
            let call = self.connector.get_active_runs(self.core.store().criteria());
            let Some(result) =
                guarded(&mut self.shutdown, self.options.call_timeout, "poll", call).await
            else {
                return Ok(ControlFlow::Break(()));
            };
            self.core.apply_poll_result(result, now())?;
        }

        self.core.sweep(now());

        let view = self.core.view(Utc::now());
        self.renderer.render(&view)?;
        Ok(ControlFlow::Continue(()))
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<ControlFlow<()>> {
        match command {
            CoreCommand::Discover(id) => {
                let call = self.connector.get_instance(&id);
                let Some(result) =
                    guarded(&mut self.shutdown, self.options.call_timeout, "discovery", call).await
                else {
                    return Ok(ControlFlow::Break(()));
                };
                self.core.apply_discovery(&id, result)?;
            }
        }
        Ok(ControlFlow::Continue(()))
    }
}

/// Await one environment call, bounded by `limit` and abandoned as soon as
/// shutdown is requested. `None` means shutdown won.
///
/// A call exceeding `limit` becomes a [`TaroError::Transport`] failure, so
/// a stalled environment degrades like a failing one.
async fn guarded<T>(
    shutdown: &mut ShutdownSignal,
    limit: Duration,
    what: &str,
    call: impl Future<Output = Result<T>>,
) -> Option<Result<T>> {
    tokio::select! {
        biased;
        _ = shutdown.wait() => {
            debug!(call = what, "shutdown requested during environment call");
            None
        }
        outcome = tokio::time::timeout(limit, call) => Some(outcome.unwrap_or_else(|_| {
            Err(TaroError::Transport(format!("{what} timed out after {limit:?}")))
        })),
    }
}

/// Current monotonic instant, taken from Tokio's clock so paused-time tests
/// drive the sweeper.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
