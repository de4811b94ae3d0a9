use serde::{Deserialize, Serialize};

use crate::node::NodeDef;

/// A complete imaging plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceDef {
  pub name: String,
  #[serde(default)]
  pub start: Vec<NodeDef>,
  #[serde(default)]
  pub targets: Vec<NodeDef>,
  #[serde(default)]
  pub end: Vec<NodeDef>,
}

impl SequenceDef {
  /// Total number of nodes in the plan, containers included.
  pub fn node_count(&self) -> usize {
    fn count(nodes: &[NodeDef]) -> usize {
      nodes
        .iter()
        .map(|node| match &node.kind {
          crate::NodeKindDef::Item { .. } => 1,
          crate::NodeKindDef::Container { items } => 1 + count(items),
        })
        .sum()
    }

    count(&self.start) + count(&self.targets) + count(&self.end)
  }
}
