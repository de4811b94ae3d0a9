use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What happens once a node has exhausted all of its attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorBehavior {
  /// Log the failure and carry on with the next instruction.
  #[default]
  ContinueOnError,
  /// Stop the whole sequence.
  AbortOnError,
  /// Abandon the remaining instructions of the enclosing instruction set.
  SkipInstructionSetOnError,
  /// Abandon the start and target sections and jump to the end section.
  SkipToSequenceEndInstructions,
}

impl ErrorBehavior {
  /// All behaviors, in declaration order.
  pub const ALL: [ErrorBehavior; 4] = [
    ErrorBehavior::ContinueOnError,
    ErrorBehavior::AbortOnError,
    ErrorBehavior::SkipInstructionSetOnError,
    ErrorBehavior::SkipToSequenceEndInstructions,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      ErrorBehavior::ContinueOnError => "continue_on_error",
      ErrorBehavior::AbortOnError => "abort_on_error",
      ErrorBehavior::SkipInstructionSetOnError => "skip_instruction_set_on_error",
      ErrorBehavior::SkipToSequenceEndInstructions => "skip_to_sequence_end_instructions",
    }
  }
}

impl fmt::Display for ErrorBehavior {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ErrorBehavior {
  type Err = ParseEnumError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    ErrorBehavior::ALL
      .into_iter()
      .find(|behavior| behavior.as_str() == s)
      .ok_or_else(|| ParseEnumError::new("error behavior", s))
  }
}

/// A string did not name any member of a closed enumeration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
  pub kind: &'static str,
  pub value: String,
}

impl ParseEnumError {
  pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
    Self {
      kind,
      value: value.into(),
    }
  }
}
