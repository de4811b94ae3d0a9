use astroseq_sequence::{Outcome, ProgressSink, ProgressUpdate, SequenceItem, Validatable};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Shows a message to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  #[serde(default)]
  pub text: String,
}

impl Message {
  pub const ITEM_TYPE: &'static str = "message";

  pub fn new(text: impl Into<String>) -> Self {
    Self { text: text.into() }
  }
}

#[async_trait]
impl SequenceItem for Message {
  fn item_type(&self) -> &'static str {
    Self::ITEM_TYPE
  }

  async fn execute(&self, progress: &dyn ProgressSink, _cancel: &CancellationToken) -> Outcome {
    info!(message = %self.text, "operator_message");
    progress.report(ProgressUpdate::new(self.text.clone()));
    Outcome::Completed
  }

  fn as_validatable(&self) -> Option<&dyn Validatable> {
    Some(self)
  }

  fn clone_item(&self) -> Box<dyn SequenceItem> {
    Box::new(self.clone())
  }
}

impl Validatable for Message {
  fn validate(&self) -> Vec<String> {
    if self.text.trim().is_empty() {
      vec!["message text is empty".to_string()]
    } else {
      Vec::new()
    }
  }
}
