use std::process::Stdio;

use astroseq_sequence::{Outcome, ProgressSink, ProgressUpdate, SequenceItem, Validatable};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs an external program. A non-zero exit fails the attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCommand {
  #[serde(default)]
  pub program: String,
  #[serde(default)]
  pub args: Vec<String>,
}

impl RunCommand {
  pub const ITEM_TYPE: &'static str = "run_command";

  pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      program: program.into(),
      args: args.into_iter().map(Into::into).collect(),
    }
  }
}

#[async_trait]
impl SequenceItem for RunCommand {
  fn item_type(&self) -> &'static str {
    Self::ITEM_TYPE
  }

  async fn execute(&self, progress: &dyn ProgressSink, cancel: &CancellationToken) -> Outcome {
    progress.report(ProgressUpdate::new(format!("Running {}", self.program)));

    let mut child = match Command::new(&self.program)
      .args(&self.args)
      .stdin(Stdio::null())
      .kill_on_drop(true)
      .spawn()
    {
      Ok(child) => child,
      Err(e) => return Outcome::failed(format!("failed to start '{}': {}", self.program, e)),
    };

    let exit = tokio::select! {
      status = child.wait() => Some(status),
      _ = cancel.cancelled() => None,
    };

    match exit {
      Some(Ok(status)) if status.success() => {
        info!(program = %self.program, "command_finished");
        Outcome::Completed
      }
      Some(Ok(status)) => Outcome::failed(format!("'{}' exited with {}", self.program, status)),
      Some(Err(e)) => Outcome::failed(format!("failed to wait for '{}': {}", self.program, e)),
      None => {
        if let Err(e) = child.kill().await {
          warn!(program = %self.program, error = %e, "command_kill_failed");
        }
        Outcome::Cancelled
      }
    }
  }

  fn as_validatable(&self) -> Option<&dyn Validatable> {
    Some(self)
  }

  fn clone_item(&self) -> Box<dyn SequenceItem> {
    Box::new(self.clone())
  }
}

impl Validatable for RunCommand {
  fn validate(&self) -> Vec<String> {
    if self.program.trim().is_empty() {
      vec!["command program is empty".to_string()]
    } else {
      Vec::new()
    }
  }
}
