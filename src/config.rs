use serde::Deserialize;
use std::path::PathBuf;

use crate::github::DEFAULT_PER_PAGE;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Account login used for the self-owned repository shorthand. Looked up
    /// from the API when unset.
    pub username: Option<String>,
    pub per_page: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            username: None,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub api_url: String,
    pub web_url: String,
    pub token_env: Option<String>,
    pub token_command: Option<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            web_url: "https://github.com".to_string(),
            token_env: Some("GITHUB_TOKEN".to_string()),
            token_command: Some("gh auth token".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub github: GitHubConfig,
}

/// ~/.config/ghfeed/config.toml (Linux) or ~/Library/Application Support/ghfeed/config.toml (macOS)
pub fn config_dir() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("ghfeed"))
}

fn config_path() -> Option<PathBuf> {
    Some(config_dir()?.join("config.toml"))
}

impl Config {
    /// Load the config file, falling back to defaults when it is missing or
    /// invalid.
    pub fn load() -> Self {
        let Some(path) = config_path() else {
            return Config::default();
        };

        let Ok(content) = std::fs::read_to_string(&path) else {
            return Config::default();
        };

        match Self::parse(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config");
                Config::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let mut config: Config = toml::from_str(content)?;
        if config.general.per_page == 0 {
            config.general.per_page = DEFAULT_PER_PAGE;
        }
        Ok(config)
    }
}
