//! Adapters that bind the orchestration engine to a real repository: libgit2 operations,
//! hook and filter scripts, the operation state file, git-config settings and terminal output.

pub mod clock;
pub mod config;
pub mod context;
pub mod display;
pub mod error;
pub mod hooks;
pub mod repo;
pub mod setup;
pub mod state_store;
pub mod vcs;

pub use context::{FlowContext, FlowEngine};
pub use error::CoreError;
