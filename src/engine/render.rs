// src/engine/render.rs

//! Interaction contract between the live loop and whatever paints it.
//!
//! The loop hands a fresh [`LiveView`] to a [`RenderSink`] once per tick.
//! Views are owned copies: a sink (or a user picking a row from one) never
//! holds on to store state, so a selected id may already be gone by the
//! time it is used. [`open_detail`] re-fetches and reports that case as
//! [`DetailView::Unavailable`].

use tracing::debug;

use crate::connector::EnvironmentConnector;
use crate::errors::Result;
use crate::job::{InstanceId, JobInstance, JobRun};

#[derive(Debug, Clone, PartialEq)]
pub struct LiveRow {
    pub run: JobRun,
    /// Run ended and is only kept for the retention window.
    pub ended: bool,
}

/// One frame of the live view.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveView {
    pub env_id: String,
    pub rows: Vec<LiveRow>,
    /// Short notice for the operator, e.g. the last poll failure.
    pub notice: Option<String>,
}

impl LiveView {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &InstanceId> {
        self.rows.iter().map(|r| &r.run.instance_id)
    }

    pub fn contains(&self, id: &InstanceId) -> bool {
        self.ids().any(|i| i == id)
    }

    pub fn row(&self, id: &InstanceId) -> Option<&LiveRow> {
        self.rows.iter().find(|r| &r.run.instance_id == id)
    }

    /// Identity of the row at `index` in this frame.
    pub fn select(&self, index: usize) -> Option<InstanceId> {
        self.rows.get(index).map(|r| r.run.instance_id.clone())
    }
}

/// Consumer of live frames.
pub trait RenderSink: Send {
    fn render(&mut self, view: &LiveView) -> Result<()>;

    /// Called once when the loop exits, on every exit path.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// What a detail view should show for a previously selected id.
#[derive(Debug, Clone, PartialEq)]
pub enum DetailView {
    Live(JobInstance),
    /// Ended, evicted or never existed by the time it was opened.
    Unavailable(InstanceId),
}

/// Resolve a selected id against the environment, not against the frame it
/// was selected from.
pub async fn open_detail<C>(connector: &C, id: &InstanceId) -> Result<DetailView>
where
    C: EnvironmentConnector + ?Sized,
{
    match connector.get_instance(id).await? {
        Some(instance) => Ok(DetailView::Live(instance)),
        None => {
            debug!(instance = %id, "selected run no longer available");
            Ok(DetailView::Unavailable(id.clone()))
        }
    }
}
