//! Agent process supervision.
//!
//! [`ProcessSupervisor`] implements the application's `AgentRunner` port by
//! launching each agent as a subprocess; [`classify`] turns its exit signals
//! into the domain's closed `ErrorKind` set.

pub mod classify;
pub mod supervisor;

pub use supervisor::{ProcessSupervisor, SupervisorConfig};
