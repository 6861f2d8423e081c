//! Domain model and orchestration for branch-based release workflows.
//!
//! This crate is free of repository and process access; adapters implement the traits in
//! [`ports`].

pub mod engine;
pub mod error;
pub mod ports;
pub mod state;
pub mod sync;
pub mod topology;

pub use error::{FlowError, FlowResult};
