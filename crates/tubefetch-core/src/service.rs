//! Request-level orchestration: validate, extract, resolve, download

use crate::cascade::{Cascade, CascadeOutcome};
use crate::config::Config;
use crate::downloader::{check_expected_size, DownloadedFile, Downloader, Selection};
use crate::error::{Result, TubeFetchError};
use crate::extractor::{Extractor, YtDlpExtractor};
use crate::formats::{self, RankedFormat};
use crate::storage::Storage;
use crate::store::{MemoryStrategyStore, StrategyStore};
use crate::url::{extract_video_id, validate_youtube_url};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Resolved qualities for one video.
#[derive(Debug, Clone, Serialize)]
pub struct VideoSummary {
    pub title: String,
    pub duration: f64,
    pub thumbnail: String,
    pub video_id: Option<String>,
    pub strategy: String,
    pub formats: Vec<RankedFormat>,
}

/// Outcome of a download request.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadSummary {
    pub title: String,
    #[serde(flatten)]
    pub file: DownloadedFileInfo,
    pub selected_quality: String,
    pub expected_size: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadedFileInfo {
    pub filename: String,
    pub filesize: u64,
    pub fallback_used: bool,
}

impl From<&DownloadedFile> for DownloadedFileInfo {
    fn from(file: &DownloadedFile) -> Self {
        Self {
            filename: file.filename.clone(),
            filesize: file.filesize,
            fallback_used: file.fallback_used,
        }
    }
}

/// Unfiltered format list for troubleshooting.
#[derive(Debug, Clone, Serialize)]
pub struct FormatDump {
    pub title: String,
    pub video_id: Option<String>,
    pub total_formats: usize,
    pub formats: Vec<RankedFormat>,
}

/// Result of downloading one exact format.
#[derive(Debug, Clone, Serialize)]
pub struct FormatTrial {
    pub title: String,
    pub filename: String,
    pub filesize: u64,
    pub format_info: FormatInfo,
}

/// What the extractor advertised for the tried format.
#[derive(Debug, Clone, Serialize)]
pub struct FormatInfo {
    pub height: Option<u32>,
    pub ext: Option<String>,
    pub bitrate: Option<f64>,
    pub expected_size: Option<u64>,
    pub codec: Option<String>,
}

/// Extraction round-trip against a known video.
#[derive(Debug, Clone, Serialize)]
pub struct SelfCheck {
    pub test_url: String,
    pub title: String,
    pub duration: f64,
    pub formats_count: usize,
    pub strategy: String,
}

/// Long-lived public video used by `self_check`.
pub const SELF_CHECK_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

pub struct VideoService {
    cascade: Cascade,
    downloader: Downloader,
    storage: Storage,
}

impl VideoService {
    pub fn new(cascade: Cascade, downloader: Downloader, storage: Storage) -> Self {
        Self {
            cascade,
            downloader,
            storage,
        }
    }

    /// Wire up yt-dlp, the downloads folder and an in-memory store from config
    pub fn from_config(config: &Config) -> Result<Self> {
        let yt_dlp_path = config.yt_dlp_path()?;
        let extractor: Arc<dyn Extractor> = Arc::new(YtDlpExtractor::new(
            yt_dlp_path.clone(),
            Duration::from_secs(config.extraction.timeout_secs),
        ));
        Ok(Self::with_extractor(config, extractor, yt_dlp_path))
    }

    /// Same as `from_config` with a caller-supplied extractor
    pub fn with_extractor(
        config: &Config,
        extractor: Arc<dyn Extractor>,
        yt_dlp_path: std::path::PathBuf,
    ) -> Self {
        let store: Arc<dyn StrategyStore> = Arc::new(MemoryStrategyStore::default());
        let cascade = Cascade::new(extractor, config.strategies(), store);
        let downloader = Downloader::new(yt_dlp_path, config.downloads.directory.clone())
            .with_ffmpeg(config.ffmpeg_path())
            .with_min_file_size(config.downloads.min_file_size)
            .with_timeout(Duration::from_secs(config.downloads.timeout_secs));
        let storage = Storage::new(config.downloads.directory.clone());

        Self::new(cascade, downloader, storage)
    }

    pub fn cascade(&self) -> &Cascade {
        &self.cascade
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Reject missing or non-YouTube URLs before any extraction
    pub fn check_url(url: &str) -> Result<String> {
        let url = url.trim();
        if url.is_empty() {
            return Err(TubeFetchError::InvalidInput(
                "Please provide a YouTube URL".to_string(),
            ));
        }
        if !validate_youtube_url(url) {
            return Err(TubeFetchError::InvalidInput(
                "Please provide a valid YouTube URL".to_string(),
            ));
        }
        Ok(url.to_string())
    }

    async fn extract(&self, url: &str) -> Result<CascadeOutcome> {
        let url = Self::check_url(url)?;
        Ok(self.cascade.run(&url).await?)
    }

    /// Title, thumbnail and ranked qualities for `url`
    pub async fn video_info(&self, url: &str) -> Result<VideoSummary> {
        let start = Instant::now();
        let CascadeOutcome { info, strategy } = self.extract(url).await?;

        let formats = formats::resolve(&info.formats);
        info!(
            "Resolved {} qualities from {} formats ({:.1}s)",
            formats.len(),
            info.formats.len(),
            start.elapsed().as_secs_f32()
        );

        Ok(VideoSummary {
            title: info.title,
            duration: info.duration.unwrap_or(0.0),
            thumbnail: info.thumbnail.unwrap_or_default(),
            video_id: extract_video_id(url),
            strategy: strategy.name,
            formats,
        })
    }

    /// Every format the extractor reported
    pub async fn debug_formats(&self, url: &str) -> Result<FormatDump> {
        let CascadeOutcome { info, .. } = self.extract(url).await?;
        let formats = formats::list_all(&info.formats);

        Ok(FormatDump {
            title: info.title,
            video_id: extract_video_id(url),
            total_formats: formats.len(),
            formats,
        })
    }

    /// Download one chosen format into the downloads folder
    pub async fn download(&self, url: &str, selection: &Selection) -> Result<DownloadSummary> {
        let url = Self::check_url(url)?;
        // usually follows a video_info call for the same video
        let CascadeOutcome { info, strategy } = self
            .cascade
            .run_preferring(&url, extract_video_id(&url).as_deref())
            .await?;
        self.storage.ensure_ready().await?;

        let selected = match selection {
            Selection::Format(id) | Selection::Exact(id) => {
                let found = info.find_format(id);
                if found.is_none() {
                    warn!("Could not find format_id {} in available formats", id);
                }
                found
            }
            Selection::CappedHeight(_) => None,
        };

        let file = self.downloader.download(&url, selection, &strategy).await?;

        let expected_size = selected.and_then(|f| f.filesize);
        check_expected_size(file.filesize, expected_size);

        let selected_quality = match (selection, selected) {
            (_, _) if file.fallback_used => "Fallback quality (best available)".to_string(),
            (Selection::Format(_), Some(f)) => f
                .height
                .map(|h| format!("{}p", h))
                .unwrap_or_else(|| "Unknown".to_string()),
            (Selection::CappedHeight(h), _) => {
                if info.formats.iter().any(|f| f.height == Some(*h)) {
                    format!("{}p", h)
                } else {
                    "Best available".to_string()
                }
            }
            _ => "Unknown".to_string(),
        };

        Ok(DownloadSummary {
            title: info.title,
            file: DownloadedFileInfo::from(&file),
            selected_quality,
            expected_size,
        })
    }

    /// Download exactly `format_id`, without merging audio or falling back
    pub async fn try_format(&self, url: &str, format_id: &str) -> Result<FormatTrial> {
        let url = Self::check_url(url)?;
        let CascadeOutcome { info, strategy } = self
            .cascade
            .run_preferring(&url, extract_video_id(&url).as_deref())
            .await?;

        let target = info.find_format(format_id).cloned().ok_or_else(|| {
            TubeFetchError::InvalidInput(format!("Format {} not found", format_id))
        })?;
        info!(
            "Trying format {}: {}p {} {} ({} kbps)",
            format_id,
            target.height.unwrap_or(0),
            target.ext.as_deref().unwrap_or("?"),
            target.format_note.as_deref().unwrap_or(""),
            target.tbr.unwrap_or(0.0)
        );

        self.storage.ensure_ready().await?;
        let file = self
            .downloader
            .download(&url, &Selection::Exact(format_id.to_string()), &strategy)
            .await?;
        check_expected_size(file.filesize, target.filesize);

        Ok(FormatTrial {
            title: info.title,
            filename: file.filename,
            filesize: file.filesize,
            format_info: FormatInfo {
                height: target.height,
                ext: target.ext,
                bitrate: target.tbr,
                expected_size: target.filesize,
                codec: target.vcodec,
            },
        })
    }

    /// Run the cascade against a known public video
    pub async fn self_check(&self) -> Result<SelfCheck> {
        let CascadeOutcome { info, strategy } = self.cascade.run(SELF_CHECK_URL).await?;
        Ok(SelfCheck {
            test_url: SELF_CHECK_URL.to_string(),
            title: info.title,
            duration: info.duration.unwrap_or(0.0),
            formats_count: info.formats.len(),
            strategy: strategy.name,
        })
    }
}
