#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::redundant_closure_for_method_calls)]

//! Sync engine for depsync.
//!
//! The engine provides:
//! - A strictly sequential command queue for installer and manifest operations
//! - A change gate that defers file-driven rebuilds during internal writes
//! - The project coordinator tying graph, manifest and status together
//! - An installer executor driving the `bower` CLI
//! - A watcher for the project's manifest and rc file

pub mod coordinator;
pub mod events;
pub mod executor;
pub mod gate;
pub mod queue;
pub mod watch;

pub use coordinator::{
    CoordinatorOptions, InstallOptions, ProjectCoordinator, SyncReport, UpdateOptions,
};
pub use events::{ProjectChange, ProjectEvent, DEFAULT_EVENT_CAPACITY};
pub use executor::{CliExecutor, ToolConfig, ToolExecutor};
pub use gate::ChangeGate;
pub use queue::{CommandQueue, QueueError, TaskHandle};
pub use watch::{ProjectWatcher, WatchError};
