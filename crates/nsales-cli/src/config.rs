//! Configuration file support

use nsales_client::ClientConfig;
use nsales_client::client::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for nsales
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend base URL including the API prefix
    pub base_url: Option<String>,
    /// Model requested for replies
    pub model: Option<String>,
    /// Whether the assistant may search the web
    pub web_search: Option<bool>,
    /// Timeout in seconds for non-streamed requests
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nsales")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("NSALES_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to parse config file: {}", e);
                Self::default()
            }),
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            base_url: Some(DEFAULT_BASE_URL.to_string()),
            model: None,
            web_search: Some(false),
            timeout_secs: Some(30),
        };

        default_config.save()?;
        Ok(path)
    }

    /// Client settings, with `base_url` taking precedence over the file
    pub fn client_config(&self, base_url: Option<&str>) -> ClientConfig {
        let mut config = ClientConfig::default();
        if let Some(url) = base_url.or(self.base_url.as_deref()) {
            config.base_url = url.to_string();
        }
        if let Some(secs) = self.timeout_secs {
            config.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        config
    }
}

/// Print example config
pub fn example_config() -> &'static str {
    r#"# nsales configuration file
# Location: ~/.config/nsales/config.toml (or $NSALES_CONFIG_PATH)

# Backend base URL, including the API prefix
base_url = "http://localhost:8000/api/v1"

# Model requested for replies (server default when unset)
# model = "gpt-4o"

# Let the assistant search the web
web_search = false

# Timeout for non-streamed requests, in seconds (0 disables it)
timeout_secs = 30
"#
}
