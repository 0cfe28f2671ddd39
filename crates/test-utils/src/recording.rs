use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use taro::engine::{LiveView, RenderSink};
use taro::errors::Result;
use taro::job::InstanceId;
use tracing::trace;

/// A render sink that:
/// - records every frame it is handed
/// - remembers whether `finish` was called
///
/// Clones share the same recording, so a test can keep one clone while the
/// runtime owns the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    frames: Arc<Mutex<Vec<LiveView>>>,
    finished: Arc<AtomicBool>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<LiveView> {
        self.frames.lock().unwrap().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<LiveView> {
        self.frames.lock().unwrap().last().cloned()
    }

    /// Ids of the last frame, in display order.
    pub fn last_ids(&self) -> Vec<InstanceId> {
        self.last()
            .map(|v| v.ids().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether any recorded frame showed `id`.
    pub fn ever_showed(&self, id: &InstanceId) -> bool {
        self.frames.lock().unwrap().iter().any(|v| v.contains(id))
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl RenderSink for RecordingRenderer {
    fn render(&mut self, view: &LiveView) -> Result<()> {
        trace!(rows = view.rows.len(), "frame recorded");
        self.frames.lock().unwrap().push(view.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished.store(true, Ordering::SeqCst);
        Ok(())
    }
}
