//! Persistent state storage for the keywatch exposure detection orchestrator.
//!
//! This crate provides the read/write contract for detection state and two
//! implementations of it:
//!
//! - [`StateStore`] - Load/save of [`UserState`](keywatch_types::UserState) and
//!   append-only exposure and summary records
//! - [`StateManager`] - JSON files in the platform data directory
//! - [`MemoryStateStore`] - Process-local storage for tests and embedding
//! - [`StateChange`] - Snapshot event broadcast on every write

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/keywatch/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod events;
mod memory;
mod state;
mod store;

pub use events::{StateChange, StateEvents};
pub use memory::MemoryStateStore;
pub use state::{Result, StateError, StateManager};
pub use store::StateStore;
