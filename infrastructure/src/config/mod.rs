//! Configuration file loading for quorum-gate
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `QUORUM_GATE_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./quorum-gate.toml`
//! 4. Global: `<config_dir>/quorum-gate/config.toml`
//! 5. Default values

mod file_config;
mod loader;
mod validation;

pub use file_config::{
    FileAgentConfig, FileConfig, FileQuorumConfig, FileRetryConfig, FileStoreConfig,
    FileSupervisorConfig,
};
pub use loader::{ConfigLoader, ENV_PREFIX, PROJECT_CONFIG_FILE};
pub use validation::{ConfigError, ConfigIssue, ConfigIssueCode, Severity};
