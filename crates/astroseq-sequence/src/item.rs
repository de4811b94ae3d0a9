//! Capabilities a node implementation plugs into the engine.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::outcome::Outcome;
use crate::progress::ProgressSink;

/// The contract every leaf instruction satisfies.
///
/// `execute` may suspend for as long as the hardware needs, but it must watch
/// `cancel` and return [`Outcome::Cancelled`] promptly once it fires.
#[async_trait]
pub trait SequenceItem: Send + Sync {
  /// Short type name used in logs and plan files.
  fn item_type(&self) -> &'static str;

  /// Perform one attempt.
  async fn execute(&self, progress: &dyn ProgressSink, cancel: &CancellationToken) -> Outcome;

  /// Pre-run validation, for items that support it.
  fn as_validatable(&self) -> Option<&dyn Validatable> {
    None
  }

  /// Copy the authored configuration of this item.
  fn clone_item(&self) -> Box<dyn SequenceItem>;
}

/// Pre-run validation capability.
pub trait Validatable {
  /// Human-readable issues. Empty means valid.
  fn validate(&self) -> Vec<String>;
}

/// Lifecycle hooks fired around a container's child loop, once per attempt.
#[async_trait]
pub trait ContainerHooks: Send + Sync {
  async fn initialize(&self, _cancel: &CancellationToken) -> Outcome {
    Outcome::Completed
  }

  async fn started(&self, _cancel: &CancellationToken) -> Outcome {
    Outcome::Completed
  }

  async fn finished(&self, _cancel: &CancellationToken) -> Outcome {
    Outcome::Completed
  }

  /// Always fires once `initialize` has been called.
  async fn teardown(&self) {}

  fn clone_hooks(&self) -> Box<dyn ContainerHooks>;
}

/// Plain instruction set: children in order, no extra behavior.
#[derive(Debug, Clone, Default)]
pub struct Sequential;

#[async_trait]
impl ContainerHooks for Sequential {
  fn clone_hooks(&self) -> Box<dyn ContainerHooks> {
    Box::new(self.clone())
  }
}
