//! Containers: nodes that own an ordered list of child nodes.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::context::RunContext;
use crate::error::SequenceError;
use crate::item::{ContainerHooks, Sequential};
use crate::node::{Metadata, Node, NodeInner, NodeKind};
use crate::outcome::Outcome;

pub(crate) struct ContainerState {
  pub(crate) items: RwLock<Vec<Node>>,
  pub(crate) hooks: Box<dyn ContainerHooks>,
  interrupted: AtomicBool,
}

impl ContainerState {
  fn new(hooks: Box<dyn ContainerHooks>) -> Self {
    Self {
      items: RwLock::new(Vec::new()),
      hooks,
      interrupted: AtomicBool::new(false),
    }
  }

  pub(crate) fn clear_interrupt(&self) {
    self.interrupted.store(false, Ordering::SeqCst);
  }
}

/// Handle to a container node.
///
/// Child list mutations re-parent the affected node while holding that
/// node's parent lock, so a node's parent always agrees with the list it
/// sits in.
#[derive(Clone)]
pub struct Container {
  node: Node,
  state: Arc<ContainerState>,
}

impl Container {
  /// Create a plain sequential container.
  pub fn new(name: impl Into<String>) -> Self {
    Self::with_hooks(name, Box::new(Sequential))
  }

  /// Create a container with custom lifecycle hooks.
  pub fn with_hooks(name: impl Into<String>, hooks: Box<dyn ContainerHooks>) -> Self {
    Self::from_metadata(Metadata::named(name.into()), hooks)
  }

  pub(crate) fn from_metadata(metadata: Metadata, hooks: Box<dyn ContainerHooks>) -> Self {
    let state = Arc::new(ContainerState::new(hooks));
    let node = Node::from_parts(metadata, NodeKind::Container(state.clone()));
    Self { node, state }
  }

  pub(crate) fn from_node(node: Node) -> Option<Self> {
    match &node.inner.kind {
      NodeKind::Container(state) => {
        let state = state.clone();
        Some(Self { node, state })
      }
      NodeKind::Item(_) => None,
    }
  }

  pub(crate) fn new_unchecked(node: Node, state: Arc<ContainerState>) -> Self {
    Self { node, state }
  }

  pub fn as_node(&self) -> &Node {
    &self.node
  }

  pub fn into_node(self) -> Node {
    self.node
  }

  pub fn ptr_eq(&self, other: &Container) -> bool {
    self.node.ptr_eq(&other.node)
  }

  /// Snapshot of the children, in execution order.
  pub fn items(&self) -> Vec<Node> {
    self.state.items.read().clone()
  }

  pub fn len(&self) -> usize {
    self.state.items.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.state.items.read().is_empty()
  }

  pub fn index_of(&self, node: &Node) -> Option<usize> {
    self.state.items.read().iter().position(|n| n.ptr_eq(node))
  }

  pub fn contains(&self, node: &Node) -> bool {
    self.index_of(node).is_some()
  }

  /// Append a node, detaching it from any previous parent.
  pub fn add(&self, node: Node) -> Result<(), SequenceError> {
    self.attach(&node, None)
  }

  /// Insert a node at `index`, detaching it from any previous parent.
  pub fn insert(&self, index: usize, node: Node) -> Result<(), SequenceError> {
    self.attach(&node, Some(index))
  }

  pub(crate) fn push_detached(&self, node: Node) {
    self.state.items.write().push(node.clone());
    *node.inner.parent.write() = Arc::downgrade(&self.node.inner);
  }

  fn attach(&self, node: &Node, index: Option<usize>) -> Result<(), SequenceError> {
    self.ensure_not_within(node)?;

    let mut parent = node.inner.parent.write();

    if let Some(index) = index {
      let len = self.len();
      if index > len {
        return Err(SequenceError::IndexOutOfRange {
          container: self.node.name(),
          index,
          len,
        });
      }
    }

    if let Some(old) = parent.upgrade().and_then(container_state) {
      old.items.write().retain(|n| !n.ptr_eq(node));
    }

    let mut items = self.state.items.write();
    let index = index.map_or(items.len(), |i| i.min(items.len()));
    items.insert(index, node.clone());
    *parent = Arc::downgrade(&self.node.inner);

    Ok(())
  }

  /// Reject inserting this container, or one of its ancestors, into itself.
  fn ensure_not_within(&self, node: &Node) -> Result<(), SequenceError> {
    let mut current = Some(self.node.clone());
    while let Some(ancestor) = current {
      if ancestor.ptr_eq(node) {
        return Err(SequenceError::CyclicInsert { name: node.name() });
      }
      current = ancestor.parent().map(Container::into_node);
    }
    Ok(())
  }

  /// Remove a direct child. Returns whether it was present.
  pub fn remove(&self, node: &Node) -> bool {
    let mut parent = node.inner.parent.write();
    let mut items = self.state.items.write();
    let before = items.len();
    items.retain(|n| !n.ptr_eq(node));
    let removed = items.len() != before;
    if removed {
      *parent = std::sync::Weak::new();
    }
    removed
  }

  /// Move a child one place earlier. The first child moves out of this
  /// container into the grandparent, right before this container.
  pub fn move_up(&self, node: &Node) -> bool {
    self.shift(node, Direction::Up)
  }

  /// Move a child one place later. The last child moves out of this
  /// container into the grandparent, right after this container.
  pub fn move_down(&self, node: &Node) -> bool {
    self.shift(node, Direction::Down)
  }

  fn shift(&self, node: &Node, direction: Direction) -> bool {
    let grandparent = self.node.parent();
    let mut parent = node.inner.parent.write();

    {
      let mut items = self.state.items.write();
      let Some(index) = items.iter().position(|n| n.ptr_eq(node)) else {
        return false;
      };
      match direction {
        Direction::Up if index > 0 => {
          items.swap(index, index - 1);
          return true;
        }
        Direction::Down if index + 1 < items.len() => {
          items.swap(index, index + 1);
          return true;
        }
        _ => {}
      }
      if grandparent.is_none() {
        return false;
      }
      items.remove(index);
    }

    let Some(grandparent) = grandparent else {
      return false;
    };
    let mut outer = grandparent.state.items.write();
    let own = outer
      .iter()
      .position(|n| n.ptr_eq(&self.node))
      .unwrap_or(outer.len());
    let target = match direction {
      Direction::Up => own,
      Direction::Down => (own + 1).min(outer.len()),
    };
    outer.insert(target, node.clone());
    *parent = Arc::downgrade(&grandparent.node.inner);
    true
  }

  /// Stop admitting further children, here and in every descendant.
  /// Children that already ran keep their status.
  pub fn interrupt(&self) {
    self.state.interrupted.store(true, Ordering::SeqCst);
    info!(node_id = %self.node.id(), name = %self.node.name(), "container_interrupted");
  }

  /// Whether this container or any ancestor has been interrupted.
  pub fn is_interrupted(&self) -> bool {
    if self.state.interrupted.load(Ordering::SeqCst) {
      return true;
    }
    self.node.parent().is_some_and(|parent| parent.is_interrupted())
  }

  /// Re-arm this container and everything below it.
  pub fn reset_all(&self) {
    self.node.reset_progress();
    for child in self.items() {
      match child.as_container() {
        Some(container) => container.reset_all(),
        None => child.reset_progress(),
      }
    }
  }

  /// One attempt: lifecycle hooks around the child loop.
  pub(crate) async fn execute(
    &self,
    ctx: &RunContext,
    token: &CancellationToken,
  ) -> Result<Outcome, SequenceError> {
    let hooks = &self.state.hooks;

    let outcome = hooks.initialize(token).await;
    let result = if outcome.is_completed() {
      self.execute_children(ctx, token).await
    } else {
      Ok(outcome)
    };
    hooks.teardown().await;

    result
  }

  async fn execute_children(
    &self,
    ctx: &RunContext,
    token: &CancellationToken,
  ) -> Result<Outcome, SequenceError> {
    let hooks = &self.state.hooks;

    let outcome = hooks.started(token).await;
    if !outcome.is_completed() {
      return Ok(outcome);
    }

    let child_ctx = ctx.with_cancel(token.clone());
    let mut interrupted = false;
    let mut index = 0;

    loop {
      if token.is_cancelled() {
        return Ok(Outcome::Cancelled);
      }
      if self.is_interrupted() {
        interrupted = true;
        break;
      }

      let next = self.state.items.read().get(index).cloned();
      let Some(child) = next else {
        break;
      };
      index += 1;

      match child.run(&child_ctx).await {
        Ok(()) => {}
        Err(SequenceError::Cancelled) => return Ok(Outcome::Cancelled),
        Err(e) => return Err(e),
      }
    }

    let outcome = hooks.finished(token).await;
    if !outcome.is_completed() {
      return Ok(outcome);
    }

    Ok(if interrupted {
      Outcome::Skipped
    } else {
      Outcome::Completed
    })
  }
}

#[derive(Clone, Copy)]
enum Direction {
  Up,
  Down,
}

fn container_state(inner: Arc<NodeInner>) -> Option<Arc<ContainerState>> {
  match &inner.kind {
    NodeKind::Container(state) => Some(state.clone()),
    NodeKind::Item(_) => None,
  }
}

impl fmt::Debug for Container {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Container")
      .field("node", &self.node)
      .field("items", &self.len())
      .finish()
  }
}
