use astroseq_config::{NodeDef, NodeKindDef, SequenceDef};
use astroseq_sequence::{Container, Node, RootContainer, SectionRole, SequenceError};
use tracing::{info, instrument, warn};

use crate::error::BuildError;
use crate::registry::ItemRegistry;

/// Turns plan definitions into live node trees.
#[derive(Debug)]
pub struct SequenceBuilder {
  registry: ItemRegistry,
}

impl SequenceBuilder {
  pub fn new(registry: ItemRegistry) -> Self {
    Self { registry }
  }

  pub fn registry(&self) -> &ItemRegistry {
    &self.registry
  }

  /// Build a plan into a root with start, targets and end sections.
  #[instrument(skip(self, def), fields(sequence = %def.name))]
  pub fn build(&self, def: &SequenceDef) -> Result<RootContainer, BuildError> {
    let root = RootContainer::with_sections(def.name.clone())?;

    for (role, defs) in [
      (SectionRole::Start, &def.start),
      (SectionRole::Targets, &def.targets),
      (SectionRole::End, &def.end),
    ] {
      let section = root
        .section(role)
        .ok_or_else(|| SequenceError::missing_section(role))?;
      for node_def in defs {
        section.add(self.build_node(node_def)?)?;
      }
    }

    info!(nodes = def.node_count(), "sequence_built");
    Ok(root)
  }

  /// Build a single node and everything below it.
  pub fn build_node(&self, def: &NodeDef) -> Result<Node, BuildError> {
    let node = match &def.kind {
      NodeKindDef::Item { item_type, params } => {
        let item = self
          .registry
          .create(item_type, params)
          .ok_or_else(|| BuildError::UnknownItemType {
            node: def.name.clone(),
            item_type: item_type.clone(),
          })?
          .map_err(|message| BuildError::InvalidParams {
            node: def.name.clone(),
            item_type: item_type.clone(),
            message,
          })?;
        Node::from_item(def.name.clone(), item)
      }
      NodeKindDef::Container { items } => {
        let container = Container::new(def.name.clone());
        for child in items {
          container.add(self.build_node(child)?)?;
        }
        container.into_node()
      }
    };

    apply_metadata(&node, def);
    Ok(node)
  }
}

impl Default for SequenceBuilder {
  fn default() -> Self {
    Self::new(ItemRegistry::with_builtins())
  }
}

fn apply_metadata(node: &Node, def: &NodeDef) {
  if let Some(category) = &def.category {
    node.set_category(category.clone());
  }
  if let Some(description) = &def.description {
    node.set_description(description.clone());
  }
  if let Some(attempts) = def.attempts {
    let accepted = u32::try_from(attempts).is_ok_and(|attempts| node.set_attempts(attempts));
    if !accepted {
      warn!(node = %def.name, attempts, "attempts_ignored");
    }
  }
  if let Some(behavior) = def.error_behavior {
    node.set_error_behavior(behavior);
  }
}
