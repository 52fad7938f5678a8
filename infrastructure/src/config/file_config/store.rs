//! Store configuration from TOML (`[store]` section)

use crate::config::validation::ConfigError;
use crate::store::PoolOptions;
use quorum_gate_application::RetentionPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Raw store configuration
///
/// ```toml
/// [store]
/// path = "~/.local/share/quorum-gate/consensus.db"
/// pool_size = 10
/// busy_timeout_ms = 5000
/// retention_days = 180
/// vacuum_pages = 20
/// maintenance_interval_hours = 24
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStoreConfig {
    /// Database file; defaults to `<data_dir>/quorum-gate/consensus.db`
    pub path: Option<PathBuf>,
    pub pool_size: u32,
    pub busy_timeout_ms: u64,
    pub retention_days: u64,
    pub vacuum_pages: u32,
    pub maintenance_interval_hours: u64,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        let pool = PoolOptions::default();
        let retention = RetentionPolicy::default();
        Self {
            path: None,
            pool_size: pool.max_size,
            busy_timeout_ms: u64::try_from(pool.busy_timeout.as_millis()).unwrap_or(u64::MAX),
            retention_days: retention.max_age.as_secs() / SECS_PER_DAY,
            vacuum_pages: retention.vacuum_pages,
            maintenance_interval_hours: 24,
        }
    }
}

const SECS_PER_DAY: u64 = 24 * 60 * 60;

impl FileStoreConfig {
    /// Database path, falling back to the platform data directory.
    pub fn resolved_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.path {
            Some(path) => Ok(expand_home(path)),
            None => dirs::data_dir()
                .map(|dir| dir.join("quorum-gate").join("consensus.db"))
                .ok_or(ConfigError::NoDataDir),
        }
    }

    pub fn to_pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_size: self.pool_size,
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            ..PoolOptions::default()
        }
    }

    pub fn to_retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_age: Duration::from_secs(self.retention_days.saturating_mul(SECS_PER_DAY)),
            vacuum_pages: self.vacuum_pages,
        }
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_hours.saturating_mul(60 * 60))
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_components() {
        let config = FileStoreConfig::default();
        assert_eq!(config.to_pool_options(), PoolOptions::default());
        assert_eq!(config.to_retention(), RetentionPolicy::default());
        assert_eq!(config.retention_days, 180);
        assert_eq!(config.maintenance_interval(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_explicit_path_is_used() {
        let config = FileStoreConfig {
            path: Some(PathBuf::from("/var/lib/gate/rounds.db")),
            ..FileStoreConfig::default()
        };
        assert_eq!(
            config.resolved_path().unwrap(),
            PathBuf::from("/var/lib/gate/rounds.db")
        );
    }

    #[test]
    fn test_home_prefix_is_expanded() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let config = FileStoreConfig {
            path: Some(PathBuf::from("~/gate/rounds.db")),
            ..FileStoreConfig::default()
        };
        assert_eq!(config.resolved_path().unwrap(), home.join("gate/rounds.db"));
    }
}
