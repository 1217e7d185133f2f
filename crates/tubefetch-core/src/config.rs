//! Configuration management for tubefetch

use crate::error::ConfigError;
use crate::strategy::ExtractionStrategy;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub paths: PathsConfig,
    pub downloads: DownloadsConfig,
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    pub host: String,
    /// Listen port
    pub port: u16,
    /// Deployed behind a public host; prefer the resilient strategy first
    pub production: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Path to yt-dlp binary (auto-detected if not set)
    pub yt_dlp: Option<PathBuf>,
    /// Path to FFmpeg binary, handed to yt-dlp for merging (auto-detected if not set)
    pub ffmpeg: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadsConfig {
    /// Folder downloaded files are written to and served from
    pub directory: PathBuf,
    /// Files smaller than this are rejected as broken downloads
    pub min_file_size: u64,
    /// Upper bound for one yt-dlp download run
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Upper bound for one metadata extraction attempt
    pub timeout_secs: u64,
    /// Ordered strategy list; empty means the built-in list
    #[serde(default)]
    pub strategies: Vec<ExtractionStrategy>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                production: false,
            },
            paths: PathsConfig {
                yt_dlp: None,
                ffmpeg: None,
            },
            downloads: DownloadsConfig {
                directory: PathBuf::from("downloads"),
                min_file_size: 1_000_000,
                timeout_secs: 1800,
            },
            extraction: ExtractionConfig {
                timeout_secs: 120,
                strategies: Vec::new(),
            },
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Load from default config directory
        if let Some(config_dir) = dirs::config_dir() {
            let default_config = config_dir.join("tubefetch/config.toml");
            if default_config.exists() {
                figment = figment.merge(Toml::file(&default_config));
            }
        }

        // Load from specified config file
        if let Some(path) = config_file {
            if !path.exists() {
                return Err(ConfigError::LoadError(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }

        // TUBEFETCH_SERVER__PORT=8080 -> server.port
        figment = figment.merge(Env::prefixed("TUBEFETCH_").split("__"));

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::LoadError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut names = std::collections::HashSet::new();
        for strategy in &self.extraction.strategies {
            if strategy.name.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "extraction strategy with empty name".to_string(),
                ));
            }
            if !names.insert(strategy.name.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "duplicate extraction strategy: {}",
                    strategy.name
                )));
            }
        }
        if self.extraction.timeout_secs == 0 || self.downloads.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Strategies in the order the cascade tries them
    pub fn strategies(&self) -> Vec<ExtractionStrategy> {
        if !self.extraction.strategies.is_empty() {
            return self.extraction.strategies.clone();
        }

        let mut defaults = ExtractionStrategy::builtin();
        if self.server.production {
            // resilient is second in the built-in list
            defaults.swap(0, 1);
        }
        defaults
    }

    /// Get yt-dlp path, auto-detecting if not configured
    pub fn yt_dlp_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref path) = self.paths.yt_dlp {
            Ok(path.clone())
        } else {
            which::which("yt-dlp")
                .map_err(|_| ConfigError::InvalidValue("yt-dlp not found in PATH".to_string()))
        }
    }

    /// Get FFmpeg path if configured or on PATH; yt-dlp copes without it
    /// for progressive formats
    pub fn ffmpeg_path(&self) -> Option<PathBuf> {
        self.paths
            .ffmpeg
            .clone()
            .or_else(|| which::which("ffmpeg").ok())
    }
}
