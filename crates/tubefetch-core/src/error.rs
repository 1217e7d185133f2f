//! Error types for tubefetch-core

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TubeFetchError>;

#[derive(Error, Debug)]
pub enum TubeFetchError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("yt-dlp not found. Install with: pip install yt-dlp")]
    ToolNotFound,

    #[error("yt-dlp failed with exit code {code:?}: {stderr}")]
    ToolFailed { code: Option<i32>, stderr: String },

    #[error("yt-dlp timed out after {0} seconds")]
    Timeout(u64),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Video unavailable or private: {0}")]
    VideoUnavailable(String),

    #[error("Request blocked by the remote site: {0}")]
    Blocked(String),

    #[error("Failed to parse metadata: {0}")]
    MetadataParse(String),

    #[error("Unusable result: {0}")]
    Unusable(String),

    #[error("All {} extraction strategies failed: {}", .attempts.len(), describe_attempts(.attempts))]
    Exhausted { attempts: Vec<FailedAttempt> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One rejected cascade attempt.
#[derive(Debug, Clone, Serialize)]
pub struct FailedAttempt {
    pub strategy: String,
    pub error: String,
}

fn describe_attempts(attempts: &[FailedAttempt]) -> String {
    if attempts.is_empty() {
        return "no strategies configured".to_string();
    }
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.strategy, a.error))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("yt-dlp not found. Install with: pip install yt-dlp")]
    ToolNotFound,

    #[error("yt-dlp failed with exit code {code:?}: {stderr}")]
    ToolFailed { code: Option<i32>, stderr: String },

    #[error("yt-dlp timed out after {0} seconds")]
    Timeout(u64),

    #[error("Downloaded file is {}, not a video. Please try a different quality option.", .0.to_uppercase())]
    NotAVideo(String),

    #[error("Downloaded file is too small to be a valid video ({0} bytes). Please try a different quality option.")]
    TooSmall(u64),

    #[error("yt-dlp did not report an output file")]
    MissingOutput,

    #[error("Both download attempts failed: {primary}; fallback: {fallback}")]
    AllAttemptsFailed { primary: String, fallback: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("Downloads folder is not writable: {0}")]
    NotWritable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    LoadError(String),

    #[error("Invalid config value: {0}")]
    InvalidValue(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
