use std::fmt;
use std::str::FromStr;

use astroseq_config::ParseEnumError;
use serde::{Deserialize, Serialize};

/// Externally observed lifecycle state of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
  /// Not yet run, or re-armed after a reset or an external stop.
  #[default]
  Created,
  Running,
  Finished,
  /// All attempts were exhausted.
  Failed,
  /// Deliberately passed over.
  Skipped,
}

impl Status {
  pub const ALL: [Status; 5] = [
    Status::Created,
    Status::Running,
    Status::Finished,
    Status::Failed,
    Status::Skipped,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Status::Created => "created",
      Status::Running => "running",
      Status::Finished => "finished",
      Status::Failed => "failed",
      Status::Skipped => "skipped",
    }
  }

  /// Whether the node reached an end state during this execution.
  pub fn is_terminal(&self) -> bool {
    matches!(self, Status::Finished | Status::Failed | Status::Skipped)
  }
}

impl fmt::Display for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Status {
  type Err = ParseEnumError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Status::ALL
      .into_iter()
      .find(|status| status.as_str() == s)
      .ok_or_else(|| ParseEnumError::new("status", s))
  }
}
