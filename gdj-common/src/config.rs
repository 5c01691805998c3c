//! Configuration loading
//!
//! TOML configuration with compiled defaults. Resolution order:
//! 1. Explicit path from the command line
//! 2. Platform config directory (`<config_dir>/gdj/config.toml`)
//! 3. Compiled defaults
//!
//! The remote-service API key is never stored in the file; the file names
//! the environment variable that carries it.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Remote generation service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the generation service
    pub endpoint: String,
    /// Model identifier requested at session setup
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativemusic.example.com".to_string(),
            model: "models/lyria-realtime".to_string(),
            api_key_env: "GDJ_API_KEY".to_string(),
        }
    }
}

/// Audio output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Output device name (None = system default)
    pub device: Option<String>,
    /// Requested callback buffer size in frames (None = device default)
    pub buffer_size: Option<u32>,
}

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP API port
    pub port: u16,
    pub remote: RemoteConfig,
    pub audio: AudioConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5810,
            remote: RemoteConfig::default(),
            audio: AudioConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration, falling back to compiled defaults
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// platform config file is not.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        if let Some(path) = default_config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        debug!("No config file found, using compiled defaults");
        Ok(Self::default())
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        info!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Resolve the remote API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.remote.api_key_env).map_err(|_| {
            Error::Config(format!(
                "API key environment variable {} is not set",
                self.remote.api_key_env
            ))
        })
    }
}

/// Platform default config file path (`<config_dir>/gdj/config.toml`)
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("gdj").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 5810);
        assert_eq!(config.remote.api_key_env, "GDJ_API_KEY");
        assert!(config.audio.device.is_none());
    }

    #[test]
    fn test_load_missing_default_file_falls_back() {
        // No explicit path: must not fail even without a platform config
        let config = Config::load(None).unwrap();
        assert!(!config.remote.endpoint.is_empty());
    }

    #[test]
    fn test_load_explicit_missing_file_is_error() {
        let result = Config::from_file(Path::new("/nonexistent/gdj.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 9000").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.port, 9000);
        // Unspecified sections keep their defaults
        assert_eq!(config.remote.model, "models/lyria-realtime");
    }

    #[test]
    fn test_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
port = 6000

[remote]
endpoint = "https://music.local"
model = "models/test"
api_key_env = "TEST_KEY"

[audio]
device = "pipewire"
buffer_size = 1024
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.remote.endpoint, "https://music.local");
        assert_eq!(config.audio.device.as_deref(), Some("pipewire"));
        assert_eq!(config.audio.buffer_size, Some(1024));
    }
}
