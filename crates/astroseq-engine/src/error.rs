use astroseq_sequence::SequenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  /// The run was stopped from outside. The plan can be resumed.
  #[error("sequence run cancelled")]
  Cancelled,

  #[error("sequence '{sequence}' aborted: {source}")]
  Aborted {
    sequence: String,
    #[source]
    source: SequenceError,
  },
}

impl EngineError {
  pub fn aborted(sequence: impl Into<String>, source: SequenceError) -> Self {
    match source {
      SequenceError::Cancelled => Self::Cancelled,
      source => Self::Aborted {
        sequence: sequence.into(),
        source,
      },
    }
  }
}
