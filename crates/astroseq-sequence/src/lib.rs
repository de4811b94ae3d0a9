//! Astroseq Sequence
//!
//! The execution core of astroseq: a tree of plan nodes and the runtime that
//! walks it depth-first, retries failing attempts, applies each node's error
//! behavior and propagates cancellation.
//!
//! # Architecture
//!
//! ```text
//! RootContainer
//! ├── owns the tree, tracks running leaf items, plan-wide interrupt
//! └── run(progress, cancel)
//!        │
//!        ▼
//! Node::run(ctx)                       (any node)
//! ├── Created → Running
//! ├── validate (leaf items only)
//! ├── attempt loop → Finished | Skipped | Created (stopped) | Failed
//! └── Failed → error behavior (continue, abort, skip set, skip to end)
//!        │
//!        ▼
//! Container::execute                   (container nodes)
//! └── initialize → started → children in order → finished → teardown
//! ```
//!
//! # Terminal states
//!
//! | Cause | Status | Escalated |
//! |---|---|---|
//! | every attempt failed | `Failed` | yes, via [`ErrorBehavior`] |
//! | [`Node::skip`] or the item chose to skip | `Skipped` | no |
//! | the plan-wide token fired | `Created` | no, `Err(Cancelled)` propagates |
//!
//! # Usage
//!
//! ```ignore
//! let root = RootContainer::with_sections("M31 LRGB")?;
//! let targets = root.section(SectionRole::Targets).unwrap();
//! targets.add(Node::item("Wait for dark", WaitForDuration::new(600.0)))?;
//!
//! let cancel = CancellationToken::new();
//! root.run(Arc::new(NoopProgress), cancel).await?;
//! ```

mod container;
mod context;
mod error;
mod item;
mod node;
mod outcome;
mod progress;
mod root;
mod status;

pub use astroseq_config::ErrorBehavior;
pub use container::Container;
pub use context::RunContext;
pub use error::SequenceError;
pub use item::{ContainerHooks, SequenceItem, Sequential, Validatable};
pub use node::Node;
pub use outcome::Outcome;
pub use progress::{ChannelProgress, LogProgress, NoopProgress, ProgressSink, ProgressUpdate};
pub use root::{DetachedRoot, RootContainer, RootObserver, RunningItem, SectionRole};
pub use status::Status;
