//! Infrastructure layer for quorum-gate
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: the agent process supervisor, the SQLite
//! consensus store, and configuration file loading.

pub mod config;
pub mod process;
pub mod store;

// Re-export commonly used types
pub use config::{
    ConfigError, ConfigIssue, ConfigLoader, FileAgentConfig, FileConfig, FileStoreConfig,
    Severity,
};
pub use process::{ProcessSupervisor, SupervisorConfig};
pub use store::{DbError, PoolOptions, SqliteConsensusStore, spawn_maintenance_daemon};
