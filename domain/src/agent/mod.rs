//! Agent execution model.
//!
//! - [`task::AgentSpec`]: roster entry resolved from configuration
//! - [`task::AgentTask`]: one agent's assignment in a round
//! - [`outcome::AgentOutcome`]: terminal result of that assignment
//! - [`error_kind::ErrorKind`]: closed set of normalized failure reasons

pub mod error_kind;
pub mod outcome;
pub mod task;
