//! Astroseq Items
//!
//! Built-in leaf items and the builder that turns a [`SequenceDef`] into a
//! live [`RootContainer`](astroseq_sequence::RootContainer).
//!
//! Item types are looked up by name in an [`ItemRegistry`]. Each factory
//! receives the `params` object of the plan node; the built-in items
//! deserialize it directly:
//!
//! | Type | Params |
//! |---|---|
//! | `wait_for_duration` | `{ "seconds": f64 }` |
//! | `message` | `{ "text": string }` |
//! | `run_command` | `{ "program": string, "args": [string] }` |
//!
//! [`SequenceDef`]: astroseq_config::SequenceDef

mod builder;
mod command;
mod error;
mod message;
mod registry;
mod wait;

pub use builder::SequenceBuilder;
pub use command::RunCommand;
pub use error::BuildError;
pub use message::Message;
pub use registry::{ItemFactory, ItemRegistry};
pub use wait::WaitForDuration;
