//! Configuration for the devpulse CLI.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Plain environment variables (`GITHUB_TOKEN`, `GITHUB_USERNAME`, `GCP_PROJECT_ID`)
//! 3. Prefixed environment variables (`DEVPULSE_GITHUB_TOKEN`, `DEVPULSE_WAREHOUSE_URL`, ...)
//! 4. Config file (./devpulse.toml, then ~/.config/devpulse/config.toml)
//! 5. Built-in defaults
//!
//! The warehouse URL defaults to `sqlite://~/.local/state/devpulse/<project>.db`
//! on Linux (using the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! [github]
//! token = "ghp_..."        # or GITHUB_TOKEN
//! username = "octocat"     # or GITHUB_USERNAME
//!
//! [warehouse]
//! project = "analytics"    # or GCP_PROJECT_ID
//! url = "postgres://localhost/devpulse"  # optional
//!
//! [extract]
//! concurrency = 1
//! requests_per_second = 10
//! no_rate_limit = false
//! ```

use std::path::PathBuf;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GitHubConfig,
    pub warehouse: WarehouseConfig,
    pub extract: ExtractConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// Personal access token.
    pub token: Option<String>,
    /// Account whose repositories and commits are extracted.
    pub username: Option<String>,
    /// API root, for GitHub Enterprise.
    pub api_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    /// Warehouse project identifier. Names the default SQLite file.
    pub project: Option<String>,
    /// Connection URL (`sqlite://` or `postgres://`).
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Repositories processed at once.
    pub concurrency: usize,
    /// Client-side request pacing.
    pub requests_per_second: u32,
    /// Whether to disable client-side pacing.
    pub no_rate_limit: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            requests_per_second: devpulse::github::DEFAULT_REQUESTS_PER_SECOND,
            no_rate_limit: false,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(" "))]
    MissingRequired(Vec<&'static str>),
}

/// The three values a run cannot start without.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub username: String,
    pub project: String,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = Self::default_config_path()
            && path.exists()
        {
            tracing::debug!("Loading config from {:?}", path);
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let local_config = PathBuf::from("devpulse.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./devpulse.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // DEVPULSE_GITHUB_TOKEN -> github.token
        builder = builder.add_source(
            Environment::with_prefix("DEVPULSE")
                .separator("_")
                .try_parsing(true),
        );

        let mut config = match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        };

        config.apply_env_fallbacks(|key| std::env::var(key).ok());
        config
    }

    /// Fill unset values from the conventional unprefixed variables.
    fn apply_env_fallbacks(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup("GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(username) = lookup("GITHUB_USERNAME") {
            self.github.username = Some(username);
        }
        if let Some(project) = lookup("GCP_PROJECT_ID").or_else(|| lookup("WAREHOUSE_PROJECT")) {
            self.warehouse.project = Some(project);
        }
    }

    /// Check every required value, naming all that are missing at once.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let token = non_blank(&self.github.token);
        let project = non_blank(&self.warehouse.project);
        let username = non_blank(&self.github.username);

        let missing: Vec<&'static str> = [
            ("GITHUB_TOKEN", token.is_none()),
            ("GCP_PROJECT_ID", project.is_none()),
            ("GITHUB_USERNAME", username.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        match (token, username, project) {
            (Some(token), Some(username), Some(project)) => Ok(Credentials {
                token: token.to_string(),
                username: username.to_string(),
                project: project.to_string(),
            }),
            _ => Err(ConfigError::MissingRequired(missing)),
        }
    }

    /// The warehouse URL, falling back to a SQLite file named after the project.
    ///
    /// The `mode=rwc` parameter creates the file if it doesn't exist.
    pub fn warehouse_url(&self, project: &str) -> Option<String> {
        self.warehouse.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join(format!("{project}.db"));
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "devpulse").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// On Linux, `$XDG_STATE_HOME/devpulse` or `~/.local/state/devpulse`.
    /// Elsewhere, the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "devpulse").map(|dirs| {
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}
