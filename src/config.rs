use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, ZtaskError};
use crate::poller::{DEFAULT_PAGE_SIZE, DEFAULT_REFRESH_INTERVAL};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    pub token_env: Option<String>,
    pub token_command: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token_env: Some("ZADIG_TOKEN".to_string()),
            token_command: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub project: String,
    pub workflow: String,
    pub page_size: u32,
    pub auto_load: bool,
    pub auto_refresh: bool,
    pub refresh_interval_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            project: String::new(),
            workflow: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            auto_load: true,
            auto_refresh: true,
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL.as_millis() as u64,
        }
    }
}

impl DashboardConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub project: Option<String>,
    pub workflow: Option<String>,
    pub page_size: Option<u32>,
    pub interval_ms: Option<u64>,
    pub no_auto_refresh: bool,
}

pub fn config_path() -> Option<PathBuf> {
    let config_dir = dirs::config_dir()?;
    Some(config_dir.join("ztask").join("config.toml"))
}

impl Config {
    /// Load from `path` (or the default location). A missing or unparsable
    /// file yields the defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match config_path() {
                Some(p) => p,
                None => return Config::default(),
            },
        };

        let Ok(content) = std::fs::read_to_string(&path) else {
            return Config::default();
        };

        match toml::from_str::<Config>(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "invalid config, using defaults");
                Config::default()
            }
        }
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(url) = overrides.base_url {
            self.server.base_url = url;
        }
        if let Some(project) = overrides.project {
            self.dashboard.project = project;
        }
        if let Some(workflow) = overrides.workflow {
            self.dashboard.workflow = workflow;
        }
        if let Some(size) = overrides.page_size {
            self.dashboard.page_size = size;
        }
        if let Some(ms) = overrides.interval_ms {
            self.dashboard.refresh_interval_ms = ms;
        }
        if overrides.no_auto_refresh {
            self.dashboard.auto_refresh = false;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.base_url.trim().is_empty() {
            return Err(ZtaskError::Config(
                "server.base_url is not set (use --base-url or config.toml)".to_string(),
            ));
        }
        if !self.server.base_url.starts_with("http://")
            && !self.server.base_url.starts_with("https://")
        {
            return Err(ZtaskError::Config(format!(
                "server.base_url must start with http:// or https://, got '{}'",
                self.server.base_url
            )));
        }
        if self.dashboard.refresh_interval_ms == 0 {
            return Err(ZtaskError::Config(
                "refresh interval must be greater than zero".to_string(),
            ));
        }
        if self.dashboard.page_size == 0 {
            return Err(ZtaskError::Config(
                "page size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
