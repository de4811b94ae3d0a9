use std::time::Duration;

use astroseq_sequence::{Outcome, ProgressSink, ProgressUpdate, SequenceItem, Validatable};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const TICK: Duration = Duration::from_secs(1);

/// Waits for a fixed time, reporting the remaining seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitForDuration {
  pub seconds: f64,
}

impl WaitForDuration {
  pub const ITEM_TYPE: &'static str = "wait_for_duration";

  pub fn new(seconds: f64) -> Self {
    Self { seconds }
  }
}

#[async_trait]
impl SequenceItem for WaitForDuration {
  fn item_type(&self) -> &'static str {
    Self::ITEM_TYPE
  }

  async fn execute(&self, progress: &dyn ProgressSink, cancel: &CancellationToken) -> Outcome {
    let total = match Duration::try_from_secs_f64(self.seconds) {
      Ok(total) => total,
      Err(e) => return Outcome::failed(format!("invalid wait of {}s: {}", self.seconds, e)),
    };
    let deadline = Instant::now() + total;

    loop {
      let remaining = deadline.saturating_duration_since(Instant::now());
      if remaining.is_zero() {
        return Outcome::Completed;
      }

      let mut update = ProgressUpdate::new(format!("Waiting {}s", remaining.as_secs_f64().ceil()));
      if !total.is_zero() {
        update = update.with_progress(1.0 - remaining.as_secs_f64() / total.as_secs_f64());
      }
      progress.report(update);

      tokio::select! {
        _ = cancel.cancelled() => return Outcome::Cancelled,
        _ = tokio::time::sleep(remaining.min(TICK)) => {}
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

impl Validatable for WaitForDuration {
  fn validate(&self) -> Vec<String> {
    if self.seconds.is_finite() && self.seconds >= 0.0 {
      Vec::new()
    } else {
      vec![format!(
        "wait duration must be a non-negative number of seconds, got {}",
        self.seconds
      )]
    }
  }
}
