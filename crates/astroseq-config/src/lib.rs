//! Astroseq Config
//!
//! This crate contains the serializable plan configuration types for astroseq.
//! These types describe an imaging sequence as it is authored, before it is
//! built into a live tree of nodes by `astroseq-items`.
//!
//! Plans are stored as JSON. A plan always follows the three-part layout
//! used by unattended imaging sessions:
//! - `start`: preparation (cool camera, unpark, open dome)
//! - `targets`: the imaging work itself
//! - `end`: shutdown instructions that must run even when targets are cut short

mod enums;
mod node;
mod sequence;

pub use enums::{ErrorBehavior, ParseEnumError};
pub use node::{NodeDef, NodeKindDef};
pub use sequence::SequenceDef;
