//! Integration tests for the sequence execution engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use astroseq_sequence::{
  ChannelProgress, Container, ContainerHooks, ErrorBehavior, NoopProgress, Node, Outcome,
  ProgressSink, ProgressUpdate, RootContainer, RootObserver, RunContext, SectionRole,
  SequenceError, SequenceItem, Status, Validatable,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
enum Behavior {
  Complete,
  Fail,
  Skip,
  WaitForCancel,
  FailOnCancel,
  IgnoreCancel,
  Invalid,
}

#[derive(Clone)]
struct Scripted {
  behavior: Behavior,
  calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SequenceItem for Scripted {
  fn item_type(&self) -> &'static str {
    "scripted"
  }

  async fn execute(&self, progress: &dyn ProgressSink, cancel: &CancellationToken) -> Outcome {
    self.calls.fetch_add(1, Ordering::SeqCst);
    progress.report(ProgressUpdate::new("working"));
    match self.behavior {
      Behavior::Complete | Behavior::Invalid => Outcome::Completed,
      Behavior::Fail => Outcome::failed("camera did not respond"),
      Behavior::Skip => Outcome::Skipped,
      Behavior::WaitForCancel => {
        cancel.cancelled().await;
        Outcome::Cancelled
      }
      Behavior::FailOnCancel => {
        cancel.cancelled().await;
        Outcome::failed("exposure aborted")
      }
      Behavior::IgnoreCancel => {
        std::future::pending::<()>().await;
        Outcome::Completed
      }
    }
  }

  fn as_validatable(&self) -> Option<&dyn Validatable> {
    Some(self)
  }

  fn clone_item(&self) -> Box<dyn SequenceItem> {
    Box::new(self.clone())
  }
}

impl Validatable for Scripted {
  fn validate(&self) -> Vec<String> {
    match self.behavior {
      Behavior::Invalid => vec!["filter wheel not connected".to_string()],
      _ => Vec::new(),
    }
  }
}

struct Leaf {
  node: Node,
  calls: Arc<AtomicUsize>,
}

impl Leaf {
  fn new(name: &str, behavior: Behavior) -> Self {
    let calls = Arc::new(AtomicUsize::new(0));
    let node = Node::item(
      name,
      Scripted {
        behavior,
        calls: calls.clone(),
      },
    );
    Self { node, calls }
  }

  fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[derive(Default)]
struct RecordingObserver {
  interrupts: AtomicUsize,
  skips_to_end: AtomicUsize,
  added: AtomicUsize,
  removed: AtomicUsize,
}

#[async_trait]
impl RootObserver for RecordingObserver {
  fn add_running_item(&self, _node: &Node) {
    self.added.fetch_add(1, Ordering::SeqCst);
  }

  fn remove_running_item(&self, _node: &Node) {
    self.removed.fetch_add(1, Ordering::SeqCst);
  }

  async fn interrupt(&self) {
    self.interrupts.fetch_add(1, Ordering::SeqCst);
  }

  async fn skip_to_end_section(&self) -> Result<(), SequenceError> {
    self.skips_to_end.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }
}

#[derive(Clone, Default)]
struct RecordingHooks {
  events: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl ContainerHooks for RecordingHooks {
  async fn initialize(&self, _cancel: &CancellationToken) -> Outcome {
    self.events.lock().push("initialize");
    Outcome::Completed
  }

  async fn started(&self, _cancel: &CancellationToken) -> Outcome {
    self.events.lock().push("started");
    Outcome::Completed
  }

  async fn finished(&self, _cancel: &CancellationToken) -> Outcome {
    self.events.lock().push("finished");
    Outcome::Completed
  }

  async fn teardown(&self) {
    self.events.lock().push("teardown");
  }

  fn clone_hooks(&self) -> Box<dyn ContainerHooks> {
    Box::new(self.clone())
  }
}

fn context(observer: Arc<RecordingObserver>, cancel: CancellationToken) -> RunContext {
  RunContext::new(Arc::new(NoopProgress), cancel, observer)
}

fn group(name: &str, leaves: &[&Leaf]) -> Container {
  let container = Container::new(name);
  for leaf in leaves {
    container.add(leaf.node.clone()).unwrap();
  }
  container
}

async fn wait_for_status(node: &Node, status: Status) {
  let mut receiver = node.subscribe();
  tokio::time::timeout(Duration::from_secs(5), receiver.wait_for(|s| *s == status))
    .await
    .expect("timed out waiting for status")
    .expect("status channel closed");
}

#[tokio::test]
async fn test_failing_item_uses_every_attempt() {
  for attempts in 1..=4 {
    let leaf = Leaf::new("Expose", Behavior::Fail);
    leaf.node.set_attempts(attempts);
    let observer = Arc::new(RecordingObserver::default());

    leaf
      .node
      .run(&context(observer.clone(), CancellationToken::new()))
      .await
      .unwrap();

    assert_eq!(leaf.calls(), attempts as usize);
    assert_eq!(leaf.node.status(), Status::Failed);
    assert_eq!(observer.interrupts.load(Ordering::SeqCst), 0);
  }
}

#[tokio::test]
async fn test_abort_on_error_interrupts_root_once() {
  let leaf = Leaf::new("Expose", Behavior::Fail);
  leaf.node.set_attempts(3);
  leaf.node.set_error_behavior(ErrorBehavior::AbortOnError);
  let observer = Arc::new(RecordingObserver::default());

  leaf
    .node
    .run(&context(observer.clone(), CancellationToken::new()))
    .await
    .unwrap();

  assert_eq!(observer.interrupts.load(Ordering::SeqCst), 1);
  assert_eq!(observer.skips_to_end.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_skip_instruction_set_interrupts_parent_only() {
  let before = Leaf::new("Before", Behavior::Complete);
  let failing = Leaf::new("Failing", Behavior::Fail);
  let skipped = Leaf::new("Skipped", Behavior::Complete);
  let sibling = Leaf::new("Next set", Behavior::Complete);
  failing
    .node
    .set_error_behavior(ErrorBehavior::SkipInstructionSetOnError);

  let set = group("Set", &[&before, &failing, &skipped]);
  let outer = Container::new("Outer");
  outer.add(set.as_node().clone()).unwrap();
  outer.add(sibling.node.clone()).unwrap();

  let observer = Arc::new(RecordingObserver::default());
  outer
    .as_node()
    .run(&context(observer.clone(), CancellationToken::new()))
    .await
    .unwrap();

  assert_eq!(observer.interrupts.load(Ordering::SeqCst), 0);
  assert!(set.is_interrupted());
  assert!(!outer.is_interrupted());
  assert_eq!(before.node.status(), Status::Finished);
  assert_eq!(failing.node.status(), Status::Failed);
  assert_eq!(skipped.node.status(), Status::Created);
  assert_eq!(skipped.calls(), 0);
  assert_eq!(set.as_node().status(), Status::Skipped);
  assert_eq!(sibling.node.status(), Status::Finished);
  assert_eq!(outer.as_node().status(), Status::Finished);
}

#[tokio::test]
async fn test_skip_running_item_ends_skipped() {
  let leaf = Leaf::new("Long exposure", Behavior::WaitForCancel);
  leaf.node.set_attempts(3);
  let observer = Arc::new(RecordingObserver::default());
  let ctx = context(observer.clone(), CancellationToken::new());

  let node = leaf.node.clone();
  let handle = tokio::spawn(async move { node.run(&ctx).await });

  wait_for_status(&leaf.node, Status::Running).await;
  leaf.node.skip();

  handle.await.unwrap().unwrap();
  assert_eq!(leaf.node.status(), Status::Skipped);
  assert_eq!(leaf.calls(), 1);
  assert_eq!(observer.interrupts.load(Ordering::SeqCst), 0);
  assert_eq!(observer.added.load(Ordering::SeqCst), 1);
  assert_eq!(observer.removed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_skip_wins_over_failure_reported_on_cancel() {
  let leaf = Leaf::new("Long exposure", Behavior::FailOnCancel);
  leaf.node.set_attempts(3);
  leaf.node.set_error_behavior(ErrorBehavior::AbortOnError);
  let observer = Arc::new(RecordingObserver::default());
  let ctx = context(observer.clone(), CancellationToken::new());

  let node = leaf.node.clone();
  let handle = tokio::spawn(async move { node.run(&ctx).await });

  wait_for_status(&leaf.node, Status::Running).await;
  leaf.node.skip();

  handle.await.unwrap().unwrap();
  assert_eq!(leaf.node.status(), Status::Skipped);
  assert_eq!(leaf.calls(), 1);
  assert_eq!(observer.interrupts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_external_cancel_wins_over_failure_reported_on_cancel() {
  let root = RootContainer::new("Plan");
  let leaf = Leaf::new("Long exposure", Behavior::FailOnCancel);
  leaf.node.set_attempts(3);
  leaf.node.set_error_behavior(ErrorBehavior::AbortOnError);
  root.container().add(leaf.node.clone()).unwrap();
  let cancel = CancellationToken::new();

  let runner = root.clone();
  let run_cancel = cancel.clone();
  let handle =
    tokio::spawn(async move { runner.run(Arc::new(NoopProgress), run_cancel).await });

  wait_for_status(&leaf.node, Status::Running).await;
  cancel.cancel();

  assert_eq!(handle.await.unwrap(), Err(SequenceError::Cancelled));
  assert_eq!(leaf.node.status(), Status::Created);
  assert_eq!(leaf.calls(), 1);
  assert!(!root.container().is_interrupted());
  assert_eq!(root.container().as_node().status(), Status::Created);
}

#[tokio::test]
async fn test_item_skip_outcome_is_not_retried() {
  let leaf = Leaf::new("Meridian flip", Behavior::Skip);
  leaf.node.set_attempts(5);
  let observer = Arc::new(RecordingObserver::default());

  leaf
    .node
    .run(&context(observer, CancellationToken::new()))
    .await
    .unwrap();

  assert_eq!(leaf.calls(), 1);
  assert_eq!(leaf.node.status(), Status::Skipped);
}

#[tokio::test]
async fn test_external_cancel_returns_to_created() {
  let running = Leaf::new("Exposure", Behavior::WaitForCancel);
  let pending = Leaf::new("Next", Behavior::Complete);
  let set = group("Set", &[&running, &pending]);
  let cancel = CancellationToken::new();
  let ctx = context(Arc::new(RecordingObserver::default()), cancel.clone());

  let node = set.as_node().clone();
  let handle = tokio::spawn(async move { node.run(&ctx).await });

  wait_for_status(&running.node, Status::Running).await;
  cancel.cancel();

  let err = handle.await.unwrap().unwrap_err();
  assert_eq!(err, SequenceError::Cancelled);
  assert_eq!(running.node.status(), Status::Created);
  assert_eq!(set.as_node().status(), Status::Created);
  assert_eq!(pending.calls(), 0);
}

#[tokio::test]
async fn test_skipping_container_leaves_child_rerunnable() {
  let running = Leaf::new("Exposure", Behavior::WaitForCancel);
  let pending = Leaf::new("Next", Behavior::Complete);
  let set = group("Set", &[&running, &pending]);
  let ctx = context(Arc::new(RecordingObserver::default()), CancellationToken::new());

  let node = set.as_node().clone();
  let handle = tokio::spawn(async move { node.run(&ctx).await });

  wait_for_status(&running.node, Status::Running).await;
  set.as_node().skip();

  handle.await.unwrap().unwrap();
  assert_eq!(set.as_node().status(), Status::Skipped);
  assert_eq!(running.node.status(), Status::Created);
  assert_eq!(pending.calls(), 0);
}

#[tokio::test]
async fn test_item_ignoring_cancellation_is_still_stopped() {
  let stubborn = Leaf::new("Stuck focuser", Behavior::IgnoreCancel);
  let cancel = CancellationToken::new();
  let ctx = context(Arc::new(RecordingObserver::default()), cancel.clone());

  let node = stubborn.node.clone();
  let handle = tokio::spawn(async move { node.run(&ctx).await });

  wait_for_status(&stubborn.node, Status::Running).await;
  cancel.cancel();

  let result = tokio::time::timeout(Duration::from_secs(5), handle)
    .await
    .expect("engine did not stop the item");
  assert_eq!(result.unwrap(), Err(SequenceError::Cancelled));
  assert_eq!(stubborn.node.status(), Status::Created);
}

#[tokio::test]
async fn test_validation_failure_skips_execution() {
  let invalid = Leaf::new("Switch filter", Behavior::Invalid);
  invalid.node.set_attempts(3);
  invalid.node.set_error_behavior(ErrorBehavior::AbortOnError);
  let observer = Arc::new(RecordingObserver::default());

  invalid
    .node
    .run(&context(observer.clone(), CancellationToken::new()))
    .await
    .unwrap();

  assert_eq!(invalid.calls(), 0);
  assert_eq!(invalid.node.status(), Status::Failed);
  assert_eq!(invalid.node.issues(), vec!["filter wheel not connected"]);
  assert_eq!(observer.interrupts.load(Ordering::SeqCst), 1);
  assert_eq!(observer.added.load(Ordering::SeqCst), 0);
  assert_eq!(observer.removed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_clone_resets_runtime_state() {
  let finished = Leaf::new("Done", Behavior::Complete);
  let failed = Leaf::new("Broken", Behavior::Fail);
  let set = group("Set", &[&finished, &failed]);
  set
    .as_node()
    .run(&context(Arc::new(RecordingObserver::default()), CancellationToken::new()))
    .await
    .unwrap();
  assert_eq!(finished.node.status(), Status::Finished);
  assert_eq!(failed.node.status(), Status::Failed);

  for source in [&finished.node, &failed.node, set.as_node()] {
    let copy = source.clone_subtree();
    assert_eq!(copy.status(), Status::Created);
    assert!(copy.parent().is_none());
    assert_eq!(copy.name(), source.name());
  }

  let copy = set.as_node().clone_subtree().as_container().unwrap();
  assert!(copy.items().iter().all(|n| n.status() == Status::Created));
}

#[tokio::test]
async fn test_reset_progress_cascaded_reaches_root() {
  let root = RootContainer::with_sections("Night").unwrap();
  let targets = root.section(SectionRole::Targets).unwrap().clone();
  let target = Container::new("M42");
  targets.add(target.as_node().clone()).unwrap();
  let leaf = Leaf::new("Expose", Behavior::Complete);
  let untouched = Leaf::new("Other", Behavior::Complete);
  target.add(leaf.node.clone()).unwrap();
  targets.add(untouched.node.clone()).unwrap();

  root
    .run(Arc::new(NoopProgress), CancellationToken::new())
    .await
    .unwrap();
  assert_eq!(root.container().as_node().status(), Status::Finished);

  leaf.node.reset_progress_cascaded();

  for node in [
    &leaf.node,
    target.as_node(),
    targets.as_node(),
    root.container().as_node(),
  ] {
    assert_eq!(node.status(), Status::Created, "{} not reset", node.name());
  }
  assert_eq!(untouched.node.status(), Status::Finished);
  assert_eq!(
    root.section(SectionRole::End).unwrap().as_node().status(),
    Status::Finished
  );
}

#[tokio::test]
async fn test_continue_on_error_plan() {
  let root = RootContainer::new("Plan");
  let leaf1 = Leaf::new("leaf1", Behavior::Complete);
  let leaf2 = Leaf::new("leaf2", Behavior::Fail);
  let leaf3 = Leaf::new("leaf3", Behavior::Complete);
  leaf2.node.set_attempts(2);
  for leaf in [&leaf1, &leaf2, &leaf3] {
    root.container().add(leaf.node.clone()).unwrap();
  }

  root
    .run(Arc::new(NoopProgress), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(leaf1.node.status(), Status::Finished);
  assert_eq!(leaf2.calls(), 2);
  assert_eq!(leaf2.node.status(), Status::Failed);
  assert_eq!(leaf3.calls(), 1);
  assert_eq!(leaf3.node.status(), Status::Finished);
  assert!(!root.container().is_interrupted());
  assert!(root.running_items().is_empty());
}

#[tokio::test]
async fn test_abort_on_error_plan() {
  let root = RootContainer::new("Plan");
  let leaf1 = Leaf::new("leaf1", Behavior::Complete);
  let leaf2 = Leaf::new("leaf2", Behavior::Fail);
  let leaf3 = Leaf::new("leaf3", Behavior::Complete);
  leaf2.node.set_attempts(2);
  leaf2.node.set_error_behavior(ErrorBehavior::AbortOnError);
  for leaf in [&leaf1, &leaf2, &leaf3] {
    root.container().add(leaf.node.clone()).unwrap();
  }

  root
    .run(Arc::new(NoopProgress), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(leaf1.node.status(), Status::Finished);
  assert_eq!(leaf2.calls(), 2);
  assert_eq!(leaf2.node.status(), Status::Failed);
  assert_eq!(leaf3.calls(), 0);
  assert_eq!(leaf3.node.status(), Status::Created);
  assert!(root.container().is_interrupted());
  assert_eq!(root.container().as_node().status(), Status::Skipped);
}

#[tokio::test]
async fn test_skip_to_end_runs_end_section() {
  let root = RootContainer::with_sections("Night").unwrap();
  let unpark = Leaf::new("Unpark", Behavior::Complete);
  let failing = Leaf::new("Center target", Behavior::Fail);
  let expose = Leaf::new("Expose", Behavior::Complete);
  let park = Leaf::new("Park", Behavior::Complete);
  failing
    .node
    .set_error_behavior(ErrorBehavior::SkipToSequenceEndInstructions);

  let start = root.section(SectionRole::Start).unwrap();
  let targets = root.section(SectionRole::Targets).unwrap();
  let end = root.section(SectionRole::End).unwrap();
  start.add(unpark.node.clone()).unwrap();
  targets.add(failing.node.clone()).unwrap();
  targets.add(expose.node.clone()).unwrap();
  end.add(park.node.clone()).unwrap();

  root
    .run(Arc::new(NoopProgress), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(unpark.node.status(), Status::Finished);
  assert_eq!(start.as_node().status(), Status::Finished);
  assert_eq!(failing.node.status(), Status::Failed);
  assert_eq!(expose.calls(), 0);
  assert_eq!(targets.as_node().status(), Status::Skipped);
  assert_eq!(park.node.status(), Status::Finished);
  assert_eq!(root.container().as_node().status(), Status::Finished);
}

#[tokio::test]
async fn test_skip_to_end_without_sections_is_fatal() {
  let root = RootContainer::new("Flat");
  let failing = Leaf::new("Center target", Behavior::Fail);
  let after = Leaf::new("After", Behavior::Complete);
  failing
    .node
    .set_error_behavior(ErrorBehavior::SkipToSequenceEndInstructions);
  root.container().add(failing.node.clone()).unwrap();
  root.container().add(after.node.clone()).unwrap();

  let err = root
    .run(Arc::new(NoopProgress), CancellationToken::new())
    .await
    .unwrap_err();

  assert!(matches!(err, SequenceError::MissingSection { .. }));
  assert_eq!(failing.node.status(), Status::Failed);
  assert_eq!(after.calls(), 0);
  assert_eq!(root.container().as_node().status(), Status::Failed);
}

#[tokio::test]
async fn test_lifecycle_hooks_fire_once_per_attempt() {
  let hooks = RecordingHooks::default();
  let container = Container::with_hooks("Target", Box::new(hooks.clone()));
  let a = Leaf::new("a", Behavior::Complete);
  let b = Leaf::new("b", Behavior::Complete);
  container.add(a.node.clone()).unwrap();
  container.add(b.node.clone()).unwrap();

  container
    .as_node()
    .run(&context(Arc::new(RecordingObserver::default()), CancellationToken::new()))
    .await
    .unwrap();

  assert_eq!(
    *hooks.events.lock(),
    vec!["initialize", "started", "finished", "teardown"]
  );
  assert_eq!(container.as_node().status(), Status::Finished);
}

#[tokio::test]
async fn test_running_items_tracked_during_execution() {
  let root = RootContainer::new("Plan");
  let leaf = Leaf::new("Exposure", Behavior::WaitForCancel);
  let group = group("Group", &[&leaf]);
  root.container().add(group.as_node().clone()).unwrap();
  let cancel = CancellationToken::new();

  let runner = root.clone();
  let run_cancel = cancel.clone();
  let handle =
    tokio::spawn(async move { runner.run(Arc::new(NoopProgress), run_cancel).await });

  wait_for_status(&leaf.node, Status::Running).await;
  let running = root.running_items();
  assert_eq!(running.len(), 1);
  assert!(running[0].node.ptr_eq(&leaf.node));
  assert!(!root.is_running(group.as_node()));

  cancel.cancel();
  assert_eq!(handle.await.unwrap(), Err(SequenceError::Cancelled));
  assert!(root.running_items().is_empty());
}

#[tokio::test]
async fn test_resume_after_stop() {
  let root = RootContainer::new("Plan");
  let first = Leaf::new("first", Behavior::Complete);
  let blocking = Leaf::new("blocking", Behavior::WaitForCancel);
  let last = Leaf::new("last", Behavior::Complete);
  for leaf in [&first, &blocking, &last] {
    root.container().add(leaf.node.clone()).unwrap();
  }
  let cancel = CancellationToken::new();

  let runner = root.clone();
  let run_cancel = cancel.clone();
  let handle =
    tokio::spawn(async move { runner.run(Arc::new(NoopProgress), run_cancel).await });
  wait_for_status(&blocking.node, Status::Running).await;
  cancel.cancel();
  assert_eq!(handle.await.unwrap(), Err(SequenceError::Cancelled));

  blocking.node.skip();
  root
    .run(Arc::new(NoopProgress), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(first.calls(), 1);
  assert_eq!(blocking.node.status(), Status::Skipped);
  assert_eq!(last.node.status(), Status::Finished);
}

#[tokio::test]
async fn test_idle_progress_reported_on_every_exit() {
  let (sink, mut receiver) = ChannelProgress::channel();
  let ok = Leaf::new("ok", Behavior::Complete);
  let failed = Leaf::new("failed", Behavior::Fail);
  let skipped = Leaf::new("skipped", Behavior::Skip);
  let set = group("Set", &[&ok, &failed, &skipped]);
  let ctx = RunContext::new(
    Arc::new(sink),
    CancellationToken::new(),
    Arc::new(RecordingObserver::default()),
  );

  set.as_node().run(&ctx).await.unwrap();
  drop(ctx);

  let mut idle_sources = Vec::new();
  while let Ok(update) = receiver.try_recv() {
    if update.is_idle() {
      idle_sources.push(update.source.unwrap_or_default());
    }
  }
  assert_eq!(idle_sources, vec!["ok", "failed", "skipped", "Set"]);
}
