use serde::{Deserialize, Serialize};

use crate::enums::ErrorBehavior;

/// Authoring definition of a single plan node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  /// Number of execution attempts. Non-positive values are ignored when the
  /// plan is built and the node keeps its default of one attempt.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub attempts: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error_behavior: Option<ErrorBehavior>,
  #[serde(flatten)]
  pub kind: NodeKindDef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKindDef {
  /// A leaf instruction looked up by type in the item registry.
  Item {
    item_type: String,
    #[serde(default)]
    params: serde_json::Value,
  },
  /// An instruction set grouping child nodes, run in order.
  Container {
    #[serde(default)]
    items: Vec<NodeDef>,
  },
}

impl NodeDef {
  /// Create a leaf definition with default metadata.
  pub fn item(
    name: impl Into<String>,
    item_type: impl Into<String>,
    params: serde_json::Value,
  ) -> Self {
    Self {
      name: name.into(),
      category: None,
      description: None,
      attempts: None,
      error_behavior: None,
      kind: NodeKindDef::Item {
        item_type: item_type.into(),
        params,
      },
    }
  }

  /// Create a container definition with default metadata.
  pub fn container(name: impl Into<String>, items: Vec<NodeDef>) -> Self {
    Self {
      name: name.into(),
      category: None,
      description: None,
      attempts: None,
      error_behavior: None,
      kind: NodeKindDef::Container { items },
    }
  }

  pub fn with_attempts(mut self, attempts: i64) -> Self {
    self.attempts = Some(attempts);
    self
  }

  pub fn with_error_behavior(mut self, behavior: ErrorBehavior) -> Self {
    self.error_behavior = Some(behavior);
    self
  }
}
