//! Astroseq Engine
//!
//! This crate drives a built plan. It wraps a
//! [`RootContainer`](astroseq_sequence::RootContainer) in a
//! [`SequenceRunner`] that validates, runs and summarises it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SequenceRunner                         │
//! │  - validate() → issues per leaf path                        │
//! │  - run(cancel) → RunReport                                  │
//! │  - reset() re-arms the plan                                 │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      RootContainer                          │
//! │  - start / targets / end sections                           │
//! │  - running items, plan-wide interrupt                       │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Node / Container                       │
//! │  - attempts, error behavior, skip, cancellation             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod error;
mod report;
mod runner;

pub use astroseq_sequence::{
  ChannelProgress, LogProgress, NoopProgress, ProgressSink, ProgressUpdate,
};
pub use error::EngineError;
pub use report::{RunReport, ValidationIssue};
pub use runner::SequenceRunner;
