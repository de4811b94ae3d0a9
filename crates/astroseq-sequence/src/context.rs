use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::progress::ProgressSink;
use crate::root::{DetachedRoot, RootObserver};

/// Everything a node needs from its surroundings while it runs.
///
/// Handed down the tree by each container; the cancellation token is
/// replaced with the container's own derived token on the way down.
#[derive(Clone)]
pub struct RunContext {
  progress: Arc<dyn ProgressSink>,
  cancel: CancellationToken,
  root: Arc<dyn RootObserver>,
}

impl RunContext {
  pub fn new(
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
    root: Arc<dyn RootObserver>,
  ) -> Self {
    Self {
      progress,
      cancel,
      root,
    }
  }

  /// A context for running a subtree that is not attached to a root.
  pub fn detached(progress: Arc<dyn ProgressSink>, cancel: CancellationToken) -> Self {
    Self::new(progress, cancel, Arc::new(DetachedRoot))
  }

  pub fn progress(&self) -> &dyn ProgressSink {
    self.progress.as_ref()
  }

  /// The caller's token. Firing it is an external stop.
  pub fn cancel(&self) -> &CancellationToken {
    &self.cancel
  }

  pub fn root(&self) -> &dyn RootObserver {
    self.root.as_ref()
  }

  pub(crate) fn with_cancel(&self, cancel: CancellationToken) -> Self {
    Self {
      progress: self.progress.clone(),
      cancel,
      root: self.root.clone(),
    }
  }
}
