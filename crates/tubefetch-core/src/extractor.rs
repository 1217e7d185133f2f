//! Video metadata extraction using yt-dlp

use crate::error::ExtractError;
use crate::formats::FormatDescriptor;
use crate::strategy::ExtractionStrategy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Metadata of one video plus its raw format list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    #[serde(default)]
    pub formats: Vec<FormatDescriptor>,
}

impl VideoInfo {
    /// Format with the given id, if the extractor listed it.
    pub fn find_format(&self, format_id: &str) -> Option<&FormatDescriptor> {
        self.formats
            .iter()
            .find(|f| f.format_id.as_deref() == Some(format_id))
    }

    /// Parse `yt-dlp -J` output. Format entries that do not match the
    /// expected shape are dropped instead of failing the whole document.
    pub fn from_json(json: &str) -> Result<Self, ExtractError> {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            id: String,
            #[serde(default)]
            title: Option<String>,
            #[serde(default)]
            duration: Option<f64>,
            #[serde(default)]
            thumbnail: Option<String>,
            #[serde(default)]
            webpage_url: Option<String>,
            #[serde(default)]
            formats: Vec<serde_json::Value>,
        }

        let raw: Raw =
            serde_json::from_str(json).map_err(|e| ExtractError::MetadataParse(e.to_string()))?;

        let total = raw.formats.len();
        let formats: Vec<FormatDescriptor> = raw
            .formats
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect();
        if formats.len() < total {
            debug!("Skipped {} malformed format entries", total - formats.len());
        }

        Ok(Self {
            id: raw.id,
            title: raw.title.unwrap_or_default(),
            duration: raw.duration,
            thumbnail: raw.thumbnail,
            webpage_url: raw.webpage_url,
            formats,
        })
    }
}

/// Source of video metadata.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Name of the extractor (for logging)
    fn name(&self) -> &'static str;

    /// Fetch metadata for `url` using the options of `strategy`
    async fn extract(
        &self,
        url: &str,
        strategy: &ExtractionStrategy,
    ) -> Result<VideoInfo, ExtractError>;
}

/// Extractor backed by the yt-dlp executable.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    yt_dlp_path: PathBuf,
    timeout: Duration,
}

impl YtDlpExtractor {
    pub fn new(yt_dlp_path: PathBuf, timeout: Duration) -> Self {
        Self {
            yt_dlp_path,
            timeout,
        }
    }

    /// `yt-dlp --version`, if the binary runs
    pub async fn version(&self) -> Option<String> {
        let output = Command::new(&self.yt_dlp_path)
            .arg("--version")
            .kill_on_drop(true)
            .output()
            .await
            .ok()?;
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn extract(
        &self,
        url: &str,
        strategy: &ExtractionStrategy,
    ) -> Result<VideoInfo, ExtractError> {
        info!("Extracting metadata ({}): {}", strategy.name, url);

        let mut cmd = Command::new(&self.yt_dlp_path);
        cmd.args(["-J", "--no-playlist", "--no-warnings"])
            .args(strategy.to_args())
            .arg("--")
            .arg(url)
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ExtractError::ToolNotFound)
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(ExtractError::Timeout(self.timeout.as_secs())),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {}", stderr);
            return Err(classify_failure(url, output.status.code(), &stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let info = VideoInfo::from_json(&stdout)?;

        debug!(
            "Extracted: {} ({}) with {} formats",
            info.title,
            info.id,
            info.formats.len()
        );
        Ok(info)
    }
}

/// Map yt-dlp's stderr onto an error variant
pub fn classify_failure(url: &str, code: Option<i32>, stderr: &str) -> ExtractError {
    if stderr.contains("Video unavailable") || stderr.contains("Private video") {
        return ExtractError::VideoUnavailable(url.to_string());
    }
    if stderr.contains("is not a valid URL") || stderr.contains("Unsupported URL") {
        return ExtractError::InvalidUrl(url.to_string());
    }
    if stderr.contains("HTTP Error 403")
        || stderr.contains("HTTP Error 429")
        || stderr.contains("Sign in to confirm")
    {
        warn!("yt-dlp request was refused by the remote site");
        return ExtractError::Blocked(last_error_line(stderr));
    }

    ExtractError::ToolFailed {
        code,
        stderr: last_error_line(stderr),
    }
}

fn last_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .find(|l| l.contains("ERROR"))
        .or_else(|| stderr.lines().rev().find(|l| !l.trim().is_empty()))
        .unwrap_or("")
        .trim()
        .to_string()
}
