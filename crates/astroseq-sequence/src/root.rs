//! The root of a plan.
//!
//! The root container owns the whole tree, keeps track of the leaf items
//! that are currently executing, and is the target of plan-wide interrupts.
//! Nodes never look the root up themselves: it is handed to them as a
//! [`RootObserver`] through the [`RunContext`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::container::Container;
use crate::context::RunContext;
use crate::error::SequenceError;
use crate::node::Node;
use crate::progress::ProgressSink;

/// What the engine needs from the root while a plan runs.
#[async_trait]
pub trait RootObserver: Send + Sync {
  /// A leaf item started executing.
  fn add_running_item(&self, node: &Node);

  /// A leaf item stopped executing, for whatever reason.
  fn remove_running_item(&self, node: &Node);

  /// Stop the whole plan from admitting further work.
  async fn interrupt(&self);

  /// Abandon the start and target sections so the end section runs next.
  async fn skip_to_end_section(&self) -> Result<(), SequenceError>;
}

/// The named parts of a three-part plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionRole {
  Start,
  Targets,
  End,
}

impl SectionRole {
  pub const ALL: [SectionRole; 3] = [SectionRole::Start, SectionRole::Targets, SectionRole::End];

  pub fn as_str(&self) -> &'static str {
    match self {
      SectionRole::Start => "start",
      SectionRole::Targets => "targets",
      SectionRole::End => "end",
    }
  }

  fn default_name(&self) -> &'static str {
    match self {
      SectionRole::Start => "Start",
      SectionRole::Targets => "Targets",
      SectionRole::End => "End",
    }
  }
}

impl fmt::Display for SectionRole {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A leaf item that is executing right now.
#[derive(Debug, Clone)]
pub struct RunningItem {
  pub node: Node,
  pub started_at: DateTime<Utc>,
}

struct Sections {
  start: Container,
  targets: Container,
  end: Container,
}

impl Sections {
  fn get(&self, role: SectionRole) -> &Container {
    match role {
      SectionRole::Start => &self.start,
      SectionRole::Targets => &self.targets,
      SectionRole::End => &self.end,
    }
  }
}

struct RootState {
  container: Container,
  sections: Option<Sections>,
  running: RwLock<Vec<RunningItem>>,
}

/// The single top-level container of a plan.
#[derive(Clone)]
pub struct RootContainer {
  state: Arc<RootState>,
}

impl RootContainer {
  /// A flat root without the start/targets/end contract.
  pub fn new(name: impl Into<String>) -> Self {
    Self::from_parts(Container::new(name), None)
  }

  /// A root with start, targets and end sections as its three children.
  pub fn with_sections(name: impl Into<String>) -> Result<Self, SequenceError> {
    let container = Container::new(name);
    let [start, targets, end] = SectionRole::ALL.map(|role| Container::new(role.default_name()));
    for section in [&start, &targets, &end] {
      container.add(section.as_node().clone())?;
    }

    Ok(Self::from_parts(
      container,
      Some(Sections {
        start,
        targets,
        end,
      }),
    ))
  }

  fn from_parts(container: Container, sections: Option<Sections>) -> Self {
    Self {
      state: Arc::new(RootState {
        container,
        sections,
        running: RwLock::new(Vec::new()),
      }),
    }
  }

  pub fn container(&self) -> &Container {
    &self.state.container
  }

  pub fn name(&self) -> String {
    self.state.container.as_node().name()
  }

  /// The container playing `role`, if the plan uses sections.
  pub fn section(&self, role: SectionRole) -> Option<&Container> {
    self.state.sections.as_ref().map(|sections| sections.get(role))
  }

  /// Snapshot of the leaf items executing right now.
  pub fn running_items(&self) -> Vec<RunningItem> {
    self.state.running.read().clone()
  }

  pub fn is_running(&self, node: &Node) -> bool {
    self
      .state
      .running
      .read()
      .iter()
      .any(|running| running.node.ptr_eq(node))
  }

  /// This root as the observer handed to running nodes.
  pub fn observer(&self) -> Arc<dyn RootObserver> {
    self.state.clone()
  }

  pub async fn interrupt(&self) {
    self.state.interrupt().await;
  }

  /// Run the plan until it completes or `cancel` fires.
  pub async fn run(
    &self,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
  ) -> Result<(), SequenceError> {
    let ctx = RunContext::new(progress, cancel, self.observer());
    self.state.container.as_node().run(&ctx).await
  }
}

#[async_trait]
impl RootObserver for RootState {
  fn add_running_item(&self, node: &Node) {
    let mut running = self.running.write();
    if !running.iter().any(|item| item.node.ptr_eq(node)) {
      running.push(RunningItem {
        node: node.clone(),
        started_at: Utc::now(),
      });
    }
  }

  fn remove_running_item(&self, node: &Node) {
    self.running.write().retain(|item| !item.node.ptr_eq(node));
  }

  async fn interrupt(&self) {
    info!(sequence = %self.container.as_node().name(), "sequence_interrupted");
    self.container.interrupt();
  }

  async fn skip_to_end_section(&self) -> Result<(), SequenceError> {
    let sections = self
      .sections
      .as_ref()
      .ok_or_else(|| SequenceError::missing_section(SectionRole::End))?;

    for role in SectionRole::ALL {
      if !self.container.contains(sections.get(role).as_node()) {
        return Err(SequenceError::missing_section(role));
      }
    }

    info!(sequence = %self.container.as_node().name(), "skip_to_end_section");
    sections.start.interrupt();
    sections.targets.interrupt();
    Ok(())
  }
}

/// Observer for subtrees run without a root, e.g. a single instruction set
/// executed on its own. Running items are not tracked.
#[derive(Debug, Clone, Default)]
pub struct DetachedRoot;

#[async_trait]
impl RootObserver for DetachedRoot {
  fn add_running_item(&self, _node: &Node) {}

  fn remove_running_item(&self, _node: &Node) {}

  async fn interrupt(&self) {
    warn!("interrupt requested outside of a sequence");
  }

  async fn skip_to_end_section(&self) -> Result<(), SequenceError> {
    Err(SequenceError::missing_section(SectionRole::End))
  }
}

impl fmt::Debug for RootContainer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RootContainer")
      .field("container", &self.state.container)
      .field("sections", &self.state.sections.is_some())
      .finish()
  }
}
