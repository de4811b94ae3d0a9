//! Progress reporting.
//!
//! Nodes report short status updates while they work ("Waiting 30s",
//! "Exposure 3/20") and an idle update whenever they stop, whatever the
//! reason. Sinks decide what to do with them (render, log, forward, ignore).

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// A single progress update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
  /// Name of the reporting node, if any.
  pub source: Option<String>,
  /// Human-readable status text. Empty means idle.
  pub status: String,
  /// Fraction complete in `0.0..=1.0`, when the reporter knows it.
  pub progress: Option<f64>,
}

impl ProgressUpdate {
  pub fn new(status: impl Into<String>) -> Self {
    Self {
      source: None,
      status: status.into(),
      progress: None,
    }
  }

  /// The update sent when a node stops working.
  pub fn idle() -> Self {
    Self::default()
  }

  pub fn with_source(mut self, source: impl Into<String>) -> Self {
    self.source = Some(source.into());
    self
  }

  pub fn with_progress(mut self, progress: f64) -> Self {
    self.progress = Some(progress.clamp(0.0, 1.0));
    self
  }

  pub fn is_idle(&self) -> bool {
    self.status.is_empty()
  }
}

/// Consumer of progress updates.
pub trait ProgressSink: Send + Sync {
  fn report(&self, update: ProgressUpdate);
}

/// Discards all updates.
#[derive(Debug, Clone, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
  fn report(&self, _update: ProgressUpdate) {}
}

/// Writes updates to the tracing log at debug level.
#[derive(Debug, Clone, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
  fn report(&self, update: ProgressUpdate) {
    debug!(
      source = update.source.as_deref().unwrap_or(""),
      status = %update.status,
      progress = ?update.progress,
      "progress"
    );
  }
}

/// Forwards updates to an unbounded channel.
///
/// Unbounded so a slow renderer never holds up the sequence.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
  sender: mpsc::UnboundedSender<ProgressUpdate>,
}

impl ChannelProgress {
  pub fn new(sender: mpsc::UnboundedSender<ProgressUpdate>) -> Self {
    Self { sender }
  }

  /// Create a sink together with the receiving end.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressUpdate>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl ProgressSink for ChannelProgress {
  fn report(&self, update: ProgressUpdate) {
    // Receiver may have been dropped
    let _ = self.sender.send(update);
  }
}

/// Fills in the reporting node's name on updates that carry none.
pub(crate) struct SourcedProgress<'a> {
  inner: &'a dyn ProgressSink,
  source: String,
}

impl<'a> SourcedProgress<'a> {
  pub(crate) fn new(inner: &'a dyn ProgressSink, source: String) -> Self {
    Self { inner, source }
  }
}

impl ProgressSink for SourcedProgress<'_> {
  fn report(&self, mut update: ProgressUpdate) {
    if update.source.is_none() {
      update.source = Some(self.source.clone());
    }
    self.inner.report(update);
  }
}
