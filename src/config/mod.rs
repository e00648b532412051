//! Configuration management for murmur.
//!
//! Configuration is read from `~/.config/murmur/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

use crate::domain::{PageQuery, DEFAULT_PAGE_SIZE};
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub feed: FeedConfig,
    pub account: AccountConfig,
}

/// Where and how to reach the posts API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".into(),
            timeout_secs: 10,
            user_agent: concat!("murmur/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub page_size: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl FeedConfig {
    /// Page size clamped to what the API accepts.
    pub fn limit(&self) -> u32 {
        PageQuery::first(self.page_size).limit
    }
}

/// The signed-in viewer. Both fields are optional; without a `user_id`
/// toggles are refused and only public collections can be browsed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    pub user_id: Option<String>,
    pub display_name: Option<String>,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            Self::create_default_config(config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::Io {
            path: config_path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/murmur/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("murmur").join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    fn default_config_content() -> &'static str {
        r##"# murmur configuration

[api]
# Root of the posts API; endpoints are resolved below it.
base_url = "http://localhost:3000/api"

# Request timeout in seconds
timeout_secs = 10

[feed]
# Posts per page (1-100)
page_size = 10

[account]
# Signed-in user. Needed for liking, favoriting and "liked by me" views.
# user_id = "your-user-id"
# display_name = "Your Name"
"##
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_deserializes() {
        let config: Config = toml::from_str(Config::default_config_content())
            .expect("Default config should be valid TOML");

        assert_eq!(config.api.base_url, "http://localhost:3000/api");
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.feed.page_size, 10);
        assert!(config.account.user_id.is_none());
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
[api]
base_url = "https://posts.example.com/api"

[account]
user_id = "u1"
"##;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        assert_eq!(config.api.base_url, "https://posts.example.com/api");
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.account.user_id.as_deref(), Some("u1"));
        assert_eq!(config.feed.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").expect("Empty config should work");
        assert_eq!(config.api.timeout_secs, 10);
        assert!(config.api.user_agent.starts_with("murmur/"));
    }

    #[test]
    fn test_page_size_is_clamped() {
        let config: Config = toml::from_str("[feed]\npage_size = 500").unwrap();
        assert_eq!(config.feed.limit(), 100);

        let config: Config = toml::from_str("[feed]\npage_size = 0").unwrap();
        assert_eq!(config.feed.limit(), 1);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("murmur").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.feed.page_size, 10);

        fs::write(&path, "[feed]\npage_size = 25\n").unwrap();
        assert_eq!(Config::load_from(&path).unwrap().feed.page_size, 25);
    }

    #[test]
    fn test_invalid_config_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[feed]\npage_size = \"many\"\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }
}
