use std::collections::HashMap;
use std::fmt;

use astroseq_sequence::SequenceItem;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::command::RunCommand;
use crate::message::Message;
use crate::wait::WaitForDuration;

/// Builds an item from its JSON params. Errors are human-readable messages.
pub type ItemFactory = Box<dyn Fn(&Value) -> Result<Box<dyn SequenceItem>, String> + Send + Sync>;

/// Maps item type names from plan files to item factories.
#[derive(Default)]
pub struct ItemRegistry {
  factories: HashMap<String, ItemFactory>,
}

impl ItemRegistry {
  /// An empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry with every built-in item type.
  pub fn with_builtins() -> Self {
    let mut registry = Self::new();
    registry.register::<WaitForDuration>(WaitForDuration::ITEM_TYPE);
    registry.register::<Message>(Message::ITEM_TYPE);
    registry.register::<RunCommand>(RunCommand::ITEM_TYPE);
    registry
  }

  /// Register an item type whose params deserialize straight into the item.
  pub fn register<T>(&mut self, item_type: impl Into<String>)
  where
    T: SequenceItem + DeserializeOwned + 'static,
  {
    self.register_factory(
      item_type,
      Box::new(|params: &Value| {
        let item: T = serde_json::from_value(normalize(params)).map_err(|e| e.to_string())?;
        Ok(Box::new(item) as Box<dyn SequenceItem>)
      }),
    );
  }

  /// Register a custom factory, replacing any previous one for the type.
  pub fn register_factory(&mut self, item_type: impl Into<String>, factory: ItemFactory) {
    self.factories.insert(item_type.into(), factory);
  }

  pub fn contains(&self, item_type: &str) -> bool {
    self.factories.contains_key(item_type)
  }

  /// Registered type names, sorted.
  pub fn item_types(&self) -> Vec<&str> {
    let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
    types.sort_unstable();
    types
  }

  /// Create an item, or `None` when the type is unknown.
  pub fn create(
    &self,
    item_type: &str,
    params: &Value,
  ) -> Option<Result<Box<dyn SequenceItem>, String>> {
    self.factories.get(item_type).map(|factory| factory(params))
  }
}

impl fmt::Debug for ItemRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ItemRegistry")
      .field("item_types", &self.item_types())
      .finish()
  }
}

/// Missing params deserialize like an empty object.
fn normalize(params: &Value) -> Value {
  match params {
    Value::Null => Value::Object(Default::default()),
    other => other.clone(),
  }
}
