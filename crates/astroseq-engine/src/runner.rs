//! Plan runner.
//!
//! The `SequenceRunner` owns a built plan and drives it: validation, a
//! single run under the caller's cancellation token, and the run report.

use std::sync::Arc;

use astroseq_sequence::{NoopProgress, ProgressSink, RootContainer};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::EngineError;
use crate::report::{RunReport, ValidationIssue};

/// Runs one plan.
///
/// # Usage
///
/// ```ignore
/// let root = SequenceBuilder::default().build(&def)?;
/// let runner = SequenceRunner::new(root).with_progress(Arc::new(LogProgress));
///
/// let cancel = CancellationToken::new();
/// let report = runner.run(cancel).await?;
/// ```
pub struct SequenceRunner {
  root: RootContainer,
  progress: Arc<dyn ProgressSink>,
}

impl SequenceRunner {
  /// Create a runner that discards progress updates.
  pub fn new(root: RootContainer) -> Self {
    Self {
      root,
      progress: Arc::new(NoopProgress),
    }
  }

  pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
    self.progress = progress;
    self
  }

  pub fn root(&self) -> &RootContainer {
    &self.root
  }

  /// Validate every leaf and return the issues found.
  pub fn validate(&self) -> Vec<ValidationIssue> {
    self.root.container().as_node().validate();
    ValidationIssue::collect(&self.root)
  }

  /// Run the plan until it ends or `cancel` fires.
  ///
  /// Invalid leaves do not stop the run; they fail when reached and their
  /// error behavior applies. On cancellation the tree is left resumable:
  /// calling `run` again continues with whatever has not finished.
  pub async fn run(&self, cancel: CancellationToken) -> Result<RunReport, EngineError> {
    let sequence = self.root.name();

    for issue in self.validate() {
      warn!(sequence = %sequence, path = %issue.path, issue = %issue.message, "validation_issue");
    }

    info!(sequence = %sequence, "sequence_started");

    match self.root.run(self.progress.clone(), cancel).await {
      Ok(()) => {
        let report = RunReport::from_root(&self.root);
        info!(
          sequence = %sequence,
          status = %report.status,
          finished = report.finished,
          failed = report.failed,
          skipped = report.skipped,
          pending = report.pending,
          "sequence_completed"
        );
        Ok(report)
      }
      Err(e) => {
        let e = EngineError::aborted(sequence.clone(), e);
        match &e {
          EngineError::Cancelled => info!(sequence = %sequence, "sequence_cancelled"),
          EngineError::Aborted { .. } => {
            error!(sequence = %sequence, error = %e, "sequence_aborted")
          }
        }
        Err(e)
      }
    }
  }

  /// Current leaf summary, without running anything.
  pub fn report(&self) -> RunReport {
    RunReport::from_root(&self.root)
  }

  /// Re-arm the whole plan so the next run starts from the beginning.
  pub fn reset(&self) {
    self.root.container().reset_all();
    info!(sequence = %self.root.name(), "sequence_reset");
  }
}
