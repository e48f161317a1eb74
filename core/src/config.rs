//! Layered configuration
//!
//! Sources, lowest precedence first: built-in defaults, a TOML file, then
//! `SCHIMP_*` environment variables (`SCHIMP_EXPLORER__MAX_STATES=500`).
//! A `.env` file in the working directory is loaded before the environment is
//! read.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "SCHIMP_CONFIG_PATH";

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "schimp.toml";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub explorer: ExplorerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Upper bound on the number of distinct states
    pub max_states: usize,
    pub collapse_deterministic: bool,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        ExplorerConfig {
            max_states: 100_000,
            collapse_deterministic: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from the default file search and the environment
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Effective configuration rendered as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration")
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    max_states: Option<usize>,
    collapse_deterministic: Option<bool>,
}

impl ConfigBuilder {
    /// Explicit config file; a missing file is an error
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Overrides every other source
    pub fn max_states(mut self, max_states: Option<usize>) -> Self {
        self.max_states = max_states;
        self
    }

    /// Overrides every other source
    pub fn collapse_deterministic(mut self, collapse: Option<bool>) -> Self {
        self.collapse_deterministic = collapse;
        self
    }

    pub fn build(self) -> Result<Config> {
        dotenvy::dotenv().ok();

        let explicit = self
            .config_path
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));

        let defaults = config::Config::try_from(&Config::default())
            .context("Failed to build default configuration")?;

        let mut builder = config::Config::builder().add_source(defaults);
        builder = match &explicit {
            Some(path) => builder.add_source(config::File::from(path.as_path()).required(true)),
            None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };
        builder = builder.add_source(
            config::Environment::with_prefix("SCHIMP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Config = builder
            .build()
            .and_then(|settings| settings.try_deserialize())
            .with_context(|| match &explicit {
                Some(path) => format!("Failed to load configuration from {}", path.display()),
                None => "Failed to load configuration".to_string(),
            })?;

        if let Some(max_states) = self.max_states {
            config.explorer.max_states = max_states;
        }
        if let Some(collapse) = self.collapse_deterministic {
            config.explorer.collapse_deterministic = collapse;
        }

        tracing::debug!(?config, "loaded configuration");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.explorer.max_states, 100_000);
        assert!(config.explorer.collapse_deterministic);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("schimp-config-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[explorer]\nmax_states = 42").unwrap();

        let config = Config::builder()
            .config_path(Some(path.clone()))
            .build()
            .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.explorer.max_states, 42);
        assert!(config.explorer.collapse_deterministic);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_builder_overrides_win() {
        let path = std::env::temp_dir().join(format!("schimp-override-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[explorer]\nmax_states = 42\ncollapse_deterministic = true").unwrap();

        let config = Config::builder()
            .config_path(Some(path.clone()))
            .max_states(Some(7))
            .collapse_deterministic(Some(false))
            .build()
            .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.explorer.max_states, 7);
        assert!(!config.explorer.collapse_deterministic);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = Config::builder()
            .config_path(Some(PathBuf::from("/nonexistent/schimp.toml")))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_to_toml_lists_sections() {
        let rendered = Config::default().to_toml().unwrap();
        assert!(rendered.contains("[explorer]"));
        assert!(rendered.contains("max_states = 100000"));
        assert!(rendered.contains("[logging]"));
        assert!(rendered.contains("filter = \"info\""));
    }
}
