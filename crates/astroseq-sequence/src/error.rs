//! Sequence errors.

use crate::root::SectionRole;

/// Errors that escape a node's `run`.
///
/// Attempt failures never show up here: they are retried and then handed to
/// the node's error behavior. What remains is the propagated external stop
/// and structural problems with the plan itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequenceError {
  /// The plan-wide cancellation token fired.
  #[error("sequence cancelled")]
  Cancelled,

  /// A node asked to skip to the end section but the plan has no such layout.
  #[error("sequence has no {section} section")]
  MissingSection { section: SectionRole },

  /// A container would become its own descendant.
  #[error("cannot insert '{name}' into itself or one of its descendants")]
  CyclicInsert { name: String },

  /// Insert position past the end of the child list.
  #[error("index {index} out of range for container '{container}' with {len} items")]
  IndexOutOfRange {
    container: String,
    index: usize,
    len: usize,
  },
}

impl SequenceError {
  pub fn missing_section(section: SectionRole) -> Self {
    Self::MissingSection { section }
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self, SequenceError::Cancelled)
  }
}
