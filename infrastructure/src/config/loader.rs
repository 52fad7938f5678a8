//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use super::validation::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

/// Project-level config file name, looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = "quorum-gate.toml";

/// Environment variable prefix; `__` separates nested keys
/// (`QUORUM_GATE_RETRY__MAX_ATTEMPTS=5`)
pub const ENV_PREFIX: &str = "QUORUM_GATE_";

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `QUORUM_GATE_*` environment variables
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./quorum-gate.toml`
    /// 4. Global: `<config_dir>/quorum-gate/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&Path>) -> Result<FileConfig, ConfigError> {
        let project = PathBuf::from(PROJECT_CONFIG_FILE);
        Self::figment(Self::global_config_path().as_deref(), Some(&project), config_path)
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    fn figment(global: Option<&Path>, project: Option<&Path>, explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        for path in [global, project].into_iter().flatten() {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        // An explicit path must exist; Toml::file would silently skip it
        if let Some(path) = explicit {
            figment = figment.merge(Toml::file_exact(path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Get the global config file path
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("quorum-gate").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        let path = PathBuf::from(PROJECT_CONFIG_FILE);
        path.exists().then_some(path)
    }

    /// Describe the config file locations being used, one per line.
    pub fn describe_sources(explicit: Option<&Path>) -> Vec<String> {
        let mark = |found: bool| if found { "[FOUND]" } else { "[     ]" };
        let mut lines = Vec::new();

        if let Some(path) = explicit {
            lines.push(format!("  {} Explicit: {}", mark(path.exists()), path.display()));
        }
        lines.push(format!(
            "  {} Project:  ./{}",
            mark(Self::project_config_path().is_some()),
            PROJECT_CONFIG_FILE
        ));
        if let Some(path) = Self::global_config_path() {
            lines.push(format!("  {} Global:   {}", mark(path.exists()), path.display()));
        }
        lines.push(format!("  [     ] Env:      {ENV_PREFIX}*"));
        lines.push("  [     ] Default:  built-in defaults".to_string());
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert!(config.agents.is_empty());
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_global_config_path_returns_some() {
        let path = ConfigLoader::global_config_path();
        assert!(path.is_some());
        assert!(path.unwrap().to_string_lossy().contains("quorum-gate"));
    }

    #[test]
    fn test_later_sources_override_earlier() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("global.toml");
        let project = dir.path().join("project.toml");
        fs::write(
            &global,
            "[retry]\nmax_attempts = 7\nbase_delay_ms = 250\n\n[agents.claude]\ncommand = \"claude\"\n",
        )
        .unwrap();
        fs::write(&project, "[retry]\nmax_attempts = 4\n").unwrap();

        let config: FileConfig = ConfigLoader::figment(Some(&global), Some(&project), None)
            .extract()
            .unwrap();

        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.base_delay_ms, 250);
        assert_eq!(config.agents["claude"].command, "claude");
    }

    #[test]
    fn test_missing_optional_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config: FileConfig =
            ConfigLoader::figment(Some(&dir.path().join("absent.toml")), None, None)
                .extract()
                .unwrap();
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConfigLoader::figment(None, None, Some(&dir.path().join("absent.toml")))
            .extract::<FileConfig>();
        assert!(result.is_err());
    }

    #[test]
    fn test_env_overrides_files() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "explicit.toml",
                "[quorum]\nrule = \"unanimous\"\n\n[retry]\nmax_attempts = 2\n",
            )?;
            jail.set_env("QUORUM_GATE_RETRY__MAX_ATTEMPTS", "6");

            let config: FileConfig =
                ConfigLoader::figment(None, None, Some(Path::new("explicit.toml"))).extract()?;

            assert_eq!(config.retry.max_attempts, 6);
            assert_eq!(config.quorum.rule, "unanimous");
            Ok(())
        });
    }
}
