//! Progress reporting for indexing runs
//!
//! Observers are advisory: they never influence the result of a run.

use std::path::PathBuf;

use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexProgress {
    pub completed: usize,
    pub total: usize,
    pub current_file: Option<PathBuf>,
}

/// Receives progress notifications from the indexing pipeline
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: &IndexProgress);

    /// Called exactly once per run, cancelled or not
    fn on_complete(&self, _completed: usize, _total: usize) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _progress: &IndexProgress) {}
}

/// Events emitted by [`ChannelObserver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Progress(IndexProgress),
    Complete { completed: usize, total: usize },
}

/// Forwards progress into an unbounded channel; a dropped receiver is ignored
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_progress(&self, progress: &IndexProgress) {
        let _ = self.sender.send(ProgressEvent::Progress(progress.clone()));
    }

    fn on_complete(&self, completed: usize, total: usize) {
        let _ = self.sender.send(ProgressEvent::Complete { completed, total });
    }
}
