//! Summaries of a plan's leaf items.

use std::fmt;

use astroseq_sequence::{Node, RootContainer, Status};
use serde::Serialize;

const PATH_SEPARATOR: &str = " > ";

/// Leaf status counts after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
  pub sequence: String,
  /// Status of the root container.
  pub status: Status,
  pub finished: usize,
  pub failed: usize,
  pub skipped: usize,
  /// Leaves that have not run (or were stopped and re-armed).
  pub pending: usize,
  /// Paths of the failed leaves, in plan order.
  pub failures: Vec<String>,
}

impl RunReport {
  pub fn from_root(root: &RootContainer) -> Self {
    let mut report = Self {
      sequence: root.name(),
      status: root.container().as_node().status(),
      finished: 0,
      failed: 0,
      skipped: 0,
      pending: 0,
      failures: Vec::new(),
    };

    visit_leaves(root, |path, node| match node.status() {
      Status::Finished => report.finished += 1,
      Status::Failed => {
        report.failed += 1;
        report.failures.push(path.to_string());
      }
      Status::Skipped => report.skipped += 1,
      Status::Created | Status::Running => report.pending += 1,
    });

    report
  }

  pub fn total(&self) -> usize {
    self.finished + self.failed + self.skipped + self.pending
  }

  /// Whether the plan ran to the end without a single failed leaf.
  pub fn is_success(&self) -> bool {
    self.status == Status::Finished && self.failed == 0
  }
}

/// A validation problem of one leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
  /// Names from the top-level section down to the leaf.
  pub path: String,
  pub message: String,
}

impl ValidationIssue {
  /// Issues recorded on the leaves by the most recent validation.
  pub fn collect(root: &RootContainer) -> Vec<Self> {
    let mut issues = Vec::new();
    visit_leaves(root, |path, node| {
      for message in node.issues() {
        issues.push(ValidationIssue {
          path: path.to_string(),
          message,
        });
      }
    });
    issues
  }
}

impl fmt::Display for ValidationIssue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.path, self.message)
  }
}

/// Visit every leaf in plan order with its path below the root.
fn visit_leaves(root: &RootContainer, mut visit: impl FnMut(&str, &Node)) {
  fn walk(node: &Node, path: &mut Vec<String>, visit: &mut dyn FnMut(&str, &Node)) {
    path.push(node.name());
    match node.as_container() {
      Some(container) => {
        for child in container.items() {
          walk(&child, path, visit);
        }
      }
      None => visit(&path.join(PATH_SEPARATOR), node),
    }
    path.pop();
  }

  let mut path = Vec::new();
  for child in root.container().items() {
    walk(&child, &mut path, &mut visit);
  }
}
