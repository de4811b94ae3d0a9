use astroseq_sequence::SequenceError;
use thiserror::Error;

/// Errors that can occur while building a plan into a live tree.
#[derive(Debug, Error)]
pub enum BuildError {
  /// No factory is registered for the item type.
  #[error("unknown item type '{item_type}' for node '{node}'")]
  UnknownItemType { node: String, item_type: String },

  /// The params of an item did not match what its type expects.
  #[error("invalid params for '{item_type}' node '{node}': {message}")]
  InvalidParams {
    node: String,
    item_type: String,
    message: String,
  },

  /// The tree rejected a structural change.
  #[error("sequence error: {0}")]
  Sequence(#[from] SequenceError),
}
