//! The node state machine.
//!
//! A [`Node`] is a shared handle to one unit of work in a plan: either a leaf
//! item or a container of further nodes. All runtime state (status, issues,
//! the local skip token) lives behind the handle so observers can hold a node
//! while the engine drives it.

use std::fmt;
use std::sync::{Arc, Weak};

use astroseq_config::ErrorBehavior;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::container::{Container, ContainerState};
use crate::context::RunContext;
use crate::error::SequenceError;
use crate::item::SequenceItem;
use crate::outcome::Outcome;
use crate::progress::{ProgressUpdate, SourcedProgress};
use crate::status::Status;

/// Authoring metadata. Carried over by [`Node::clone_subtree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Metadata {
  pub(crate) name: String,
  pub(crate) category: String,
  pub(crate) description: String,
  pub(crate) attempts: u32,
  pub(crate) error_behavior: ErrorBehavior,
}

impl Metadata {
  pub(crate) fn named(name: String) -> Self {
    Self {
      name,
      category: String::new(),
      description: String::new(),
      attempts: 1,
      error_behavior: ErrorBehavior::default(),
    }
  }
}

pub(crate) enum NodeKind {
  Item(Box<dyn SequenceItem>),
  Container(Arc<ContainerState>),
}

pub(crate) struct NodeInner {
  id: Uuid,
  metadata: RwLock<Metadata>,
  status: watch::Sender<Status>,
  issues: RwLock<Vec<String>>,
  pub(crate) parent: RwLock<Weak<NodeInner>>,
  /// Local token of the current run. `Some` exactly while running.
  skip_token: Mutex<Option<CancellationToken>>,
  pub(crate) kind: NodeKind,
}

/// Shared handle to a plan node. Cloning the handle does not copy the node;
/// use [`Node::clone_subtree`] for that.
#[derive(Clone)]
pub struct Node {
  pub(crate) inner: Arc<NodeInner>,
}

impl Node {
  pub(crate) fn from_parts(metadata: Metadata, kind: NodeKind) -> Self {
    let (status, _) = watch::channel(Status::Created);
    Self {
      inner: Arc::new(NodeInner {
        id: Uuid::new_v4(),
        metadata: RwLock::new(metadata),
        status,
        issues: RwLock::new(Vec::new()),
        parent: RwLock::new(Weak::new()),
        skip_token: Mutex::new(None),
        kind,
      }),
    }
  }

  pub(crate) fn from_inner(inner: Arc<NodeInner>) -> Self {
    Self { inner }
  }

  /// Create a leaf node.
  pub fn item(name: impl Into<String>, item: impl SequenceItem + 'static) -> Self {
    Self::from_item(name, Box::new(item))
  }

  /// Create a leaf node from an already boxed item.
  pub fn from_item(name: impl Into<String>, item: Box<dyn SequenceItem>) -> Self {
    Self::from_parts(Metadata::named(name.into()), NodeKind::Item(item))
  }

  pub fn id(&self) -> Uuid {
    self.inner.id
  }

  pub fn name(&self) -> String {
    self.inner.metadata.read().name.clone()
  }

  pub fn set_name(&self, name: impl Into<String>) {
    self.inner.metadata.write().name = name.into();
  }

  pub fn category(&self) -> String {
    self.inner.metadata.read().category.clone()
  }

  pub fn set_category(&self, category: impl Into<String>) {
    self.inner.metadata.write().category = category.into();
  }

  pub fn description(&self) -> String {
    self.inner.metadata.read().description.clone()
  }

  pub fn set_description(&self, description: impl Into<String>) {
    self.inner.metadata.write().description = description.into();
  }

  pub fn attempts(&self) -> u32 {
    self.inner.metadata.read().attempts
  }

  /// Set the attempt budget. Zero is rejected and leaves the value unchanged.
  pub fn set_attempts(&self, attempts: u32) -> bool {
    if attempts == 0 {
      return false;
    }
    self.inner.metadata.write().attempts = attempts;
    true
  }

  pub fn error_behavior(&self) -> ErrorBehavior {
    self.inner.metadata.read().error_behavior
  }

  pub fn set_error_behavior(&self, behavior: ErrorBehavior) {
    self.inner.metadata.write().error_behavior = behavior;
  }

  pub fn status(&self) -> Status {
    *self.inner.status.borrow()
  }

  /// Watch status transitions.
  pub fn subscribe(&self) -> watch::Receiver<Status> {
    self.inner.status.subscribe()
  }

  /// Issues recorded by the most recent validation.
  pub fn issues(&self) -> Vec<String> {
    self.inner.issues.read().clone()
  }

  pub fn parent(&self) -> Option<Container> {
    let parent = self.inner.parent.read().upgrade()?;
    Container::from_node(Node::from_inner(parent))
  }

  pub fn is_container(&self) -> bool {
    matches!(self.inner.kind, NodeKind::Container(_))
  }

  pub fn as_container(&self) -> Option<Container> {
    Container::from_node(self.clone())
  }

  /// The item type of a leaf, `None` for containers.
  pub fn item_type(&self) -> Option<&'static str> {
    match &self.inner.kind {
      NodeKind::Item(item) => Some(item.item_type()),
      NodeKind::Container(_) => None,
    }
  }

  /// Whether both handles refer to the same node.
  pub fn ptr_eq(&self, other: &Node) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }

  pub(crate) fn set_status(&self, status: Status) {
    self.inner.status.send_replace(status);
  }

  /// Run the node once.
  ///
  /// A no-op unless the node is `Created`. Returns `Err(Cancelled)` when the
  /// caller's token stopped the node; the node is then back at `Created`.
  pub fn run<'a>(&'a self, ctx: &'a RunContext) -> BoxFuture<'a, Result<(), SequenceError>> {
    let span = info_span!(
      "node_run",
      node_id = %self.inner.id,
      name = %self.name(),
    );
    async move { self.run_inner(ctx).await }
      .instrument(span)
      .boxed()
  }

  async fn run_inner(&self, ctx: &RunContext) -> Result<(), SequenceError> {
    let token = {
      let mut skip_token = self.inner.skip_token.lock();
      let status = self.status();
      if status != Status::Created {
        debug!(status = %status, "node_not_runnable");
        return Ok(());
      }
      let token = ctx.cancel().child_token();
      *skip_token = Some(token.clone());
      self.set_status(Status::Running);
      token
    };

    info!(item_type = self.item_type().unwrap_or("container"), "node_started");

    let result = if !self.is_container() && !self.validate() {
      let issues = self.issues();
      warn!(issues = ?issues, "validation_failed");
      self
        .fail(ctx, format!("validation failed: {}", issues.join("; ")))
        .await
    } else {
      let registered = !self.is_container();
      if registered {
        ctx.root().add_running_item(self);
      }
      let result = self.run_attempts(ctx, &token).await;
      if registered {
        ctx.root().remove_running_item(self);
      }
      result
    };

    ctx
      .progress()
      .report(ProgressUpdate::idle().with_source(self.name()));
    self.inner.skip_token.lock().take();

    result
  }

  async fn run_attempts(
    &self,
    ctx: &RunContext,
    token: &CancellationToken,
  ) -> Result<(), SequenceError> {
    let attempts = self.attempts();
    let mut last_reason = String::new();

    for attempt in 1..=attempts {
      if let Some(stopped) = self.stop_requested(ctx, token) {
        return stopped;
      }

      let outcome = match self.execute_attempt(ctx, token).await {
        Ok(outcome) => outcome,
        Err(e) => {
          self.set_status(Status::Failed);
          error!(error = %e, "node_aborted");
          return Err(e);
        }
      };

      match outcome {
        Outcome::Completed => {
          self.set_status(Status::Finished);
          info!(attempt, "node_finished");
          return Ok(());
        }
        Outcome::Skipped => {
          self.set_status(Status::Skipped);
          info!("node_skipped");
          return Ok(());
        }
        Outcome::Cancelled | Outcome::Failed { .. } if token.is_cancelled() => {
          if let Some(stopped) = self.stop_requested(ctx, token) {
            return stopped;
          }
        }
        Outcome::Cancelled => {
          last_reason = "cancelled without a cancellation request".to_string();
          warn!(attempt, attempts, reason = %last_reason, "attempt_failed");
        }
        Outcome::Failed { reason } => {
          warn!(attempt, attempts, reason = %reason, "attempt_failed");
          last_reason = reason;
        }
      }
    }

    self.fail(ctx, last_reason).await
  }

  /// Terminal result for a stop request, if either token has fired. The
  /// caller's token takes precedence over the local one.
  fn stop_requested(
    &self,
    ctx: &RunContext,
    token: &CancellationToken,
  ) -> Option<Result<(), SequenceError>> {
    if ctx.cancel().is_cancelled() {
      self.set_status(Status::Created);
      info!("node_cancelled");
      Some(Err(SequenceError::Cancelled))
    } else if token.is_cancelled() {
      self.set_status(Status::Skipped);
      info!("node_skipped");
      Some(Ok(()))
    } else {
      None
    }
  }

  async fn execute_attempt(
    &self,
    ctx: &RunContext,
    token: &CancellationToken,
  ) -> Result<Outcome, SequenceError> {
    match &self.inner.kind {
      NodeKind::Item(item) => {
        let progress = SourcedProgress::new(ctx.progress(), self.name());
        Ok(tokio::select! {
          biased;
          outcome = item.execute(&progress, token) => outcome,
          _ = token.cancelled() => Outcome::Cancelled,
        })
      }
      NodeKind::Container(state) => {
        Container::new_unchecked(self.clone(), state.clone())
          .execute(ctx, token)
          .await
      }
    }
  }

  /// Mark the node failed and apply its error behavior.
  async fn fail(&self, ctx: &RunContext, reason: String) -> Result<(), SequenceError> {
    self.set_status(Status::Failed);
    let behavior = self.error_behavior();
    error!(reason = %reason, error_behavior = %behavior, "node_failed");

    match behavior {
      ErrorBehavior::ContinueOnError => Ok(()),
      ErrorBehavior::AbortOnError => {
        ctx.root().interrupt().await;
        Ok(())
      }
      ErrorBehavior::SkipInstructionSetOnError => {
        if let Some(parent) = self.parent() {
          parent.interrupt();
        }
        Ok(())
      }
      ErrorBehavior::SkipToSequenceEndInstructions => ctx.root().skip_to_end_section().await,
    }
  }

  /// Skip this node.
  ///
  /// While running, stops the current attempt and ends the node as
  /// `Skipped`. A node that has not started yet is marked `Skipped` so the
  /// walker passes over it. Otherwise nothing happens.
  pub fn skip(&self) {
    let skip_token = self.inner.skip_token.lock();
    match skip_token.as_ref() {
      Some(token) => {
        info!(node_id = %self.inner.id, "skip_requested");
        token.cancel();
      }
      None if self.status() == Status::Created => self.set_status(Status::Skipped),
      None => {}
    }
  }

  /// Validate the node. Containers validate every descendant.
  pub fn validate(&self) -> bool {
    match &self.inner.kind {
      NodeKind::Item(item) => {
        let issues = item
          .as_validatable()
          .map(|validatable| validatable.validate())
          .unwrap_or_default();
        let valid = issues.is_empty();
        *self.inner.issues.write() = issues;
        valid
      }
      NodeKind::Container(state) => {
        let children = state.items.read().clone();
        let mut valid = true;
        for child in &children {
          valid &= child.validate();
        }
        valid
      }
    }
  }

  /// Re-arm this node. Containers also clear their interrupt flag.
  pub fn reset_progress(&self) {
    if let NodeKind::Container(state) = &self.inner.kind {
      state.clear_interrupt();
    }
    self.set_status(Status::Created);
  }

  /// Re-arm this node and every ancestor up to the root.
  pub fn reset_progress_cascaded(&self) {
    self.reset_progress();
    let mut current = self.parent();
    while let Some(container) = current {
      container.as_node().reset_progress();
      current = container.as_node().parent();
    }
  }

  /// Copy the authored plan below this node. The copy is `Created` and has
  /// no parent.
  pub fn clone_subtree(&self) -> Node {
    let metadata = self.inner.metadata.read().clone();
    match &self.inner.kind {
      NodeKind::Item(item) => Node::from_parts(metadata, NodeKind::Item(item.clone_item())),
      NodeKind::Container(state) => {
        let copy = Container::from_metadata(metadata, state.hooks.clone_hooks());
        let children = state.items.read().clone();
        for child in &children {
          copy.push_detached(child.clone_subtree());
        }
        copy.into_node()
      }
    }
  }
}

impl PartialEq for Node {
  fn eq(&self, other: &Self) -> bool {
    self.ptr_eq(other)
  }
}

impl Eq for Node {}

impl fmt::Debug for Node {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Node")
      .field("id", &self.inner.id)
      .field("name", &self.name())
      .field("status", &self.status())
      .field("container", &self.is_container())
      .finish()
  }
}
