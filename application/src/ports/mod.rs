//! Port definitions (interfaces for external adapters)

pub mod agent_runner;
pub mod consensus_store;
pub mod progress;
