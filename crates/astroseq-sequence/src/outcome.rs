//! Result of a single execution attempt.

/// What one call to [`SequenceItem::execute`](crate::SequenceItem::execute)
/// produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  /// The attempt succeeded.
  Completed,
  /// The item decided not to do its work. Not an error and never retried.
  Skipped,
  /// The cancellation token fired while the attempt was in flight.
  Cancelled,
  /// The attempt failed. Retried while attempts remain.
  Failed { reason: String },
}

impl Outcome {
  pub fn failed(reason: impl Into<String>) -> Self {
    Self::Failed {
      reason: reason.into(),
    }
  }

  pub fn is_completed(&self) -> bool {
    matches!(self, Outcome::Completed)
  }
}

impl<E: std::fmt::Display> From<Result<(), E>> for Outcome {
  fn from(result: Result<(), E>) -> Self {
    match result {
      Ok(()) => Outcome::Completed,
      Err(e) => Outcome::failed(e.to_string()),
    }
  }
}
