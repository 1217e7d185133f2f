//! Video downloader using yt-dlp

use crate::error::DownloadError;
use crate::strategy::ExtractionStrategy;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Extensions yt-dlp sometimes produces that are not video.
const INVALID_EXTENSIONS: [&str; 7] = ["mhtml", "html", "htm", "jpg", "png", "webp", "gif"];

/// Selector for the second attempt.
const FALLBACK_SELECTOR: &str = "best[ext=mp4]/best";

/// What to ask yt-dlp for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A format id from the resolved list (or a selector expression)
    Format(String),
    /// Best stream no taller than the given height
    CappedHeight(u32),
    /// Exactly this format, no audio merge and no fallback
    Exact(String),
}

impl Selection {
    /// yt-dlp `-f` argument
    pub fn selector(&self) -> String {
        match self {
            Selection::Format(id) if is_selector_expression(id) => id.clone(),
            Selection::Format(id) => format!("{}+bestaudio/best", id),
            Selection::CappedHeight(h) => format!(
                "best[height<={h}][ext=mp4]/best[height<={h}]/best[ext=mp4]/best",
                h = h
            ),
            Selection::Exact(id) => id.clone(),
        }
    }

    /// Suffix put into the output filename
    pub fn file_tag(&self) -> String {
        match self {
            Selection::Format(id) if is_selector_expression(id) => "auto".to_string(),
            Selection::Format(_) => "%(format_id)s".to_string(),
            Selection::CappedHeight(h) => format!("{}p", h),
            Selection::Exact(_) => "test_%(format_id)s".to_string(),
        }
    }

    fn allows_fallback(&self) -> bool {
        !matches!(self, Selection::Exact(_))
    }
}

fn is_selector_expression(id: &str) -> bool {
    id.contains('/') || id.contains('[') || id.contains('+')
}

#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub filename: String,
    pub filesize: u64,
    pub fallback_used: bool,
}

#[derive(Debug)]
pub struct Downloader {
    yt_dlp_path: PathBuf,
    ffmpeg_path: Option<PathBuf>,
    output_dir: PathBuf,
    min_file_size: u64,
    timeout: Duration,
}

impl Downloader {
    pub fn new(yt_dlp_path: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            yt_dlp_path,
            ffmpeg_path: None,
            output_dir,
            min_file_size: 1_000_000,
            timeout: Duration::from_secs(1800),
        }
    }

    pub fn with_ffmpeg(mut self, ffmpeg_path: Option<PathBuf>) -> Self {
        self.ffmpeg_path = ffmpeg_path;
        self
    }

    pub fn with_min_file_size(mut self, bytes: u64) -> Self {
        self.min_file_size = bytes;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Download `selection` of `url`; on failure retry once with a plain
    /// best-mp4 selection (except for `Selection::Exact`).
    pub async fn download(
        &self,
        url: &str,
        selection: &Selection,
        strategy: &ExtractionStrategy,
    ) -> Result<DownloadedFile, DownloadError> {
        info!("Downloading {} ({})", url, selection.selector());

        let primary = match self
            .run_yt_dlp(url, &selection.selector(), &selection.file_tag(), strategy)
            .await
        {
            Ok(path) => return self.validate(path, false).await,
            Err(e @ (DownloadError::ToolNotFound | DownloadError::Timeout(_))) => return Err(e),
            Err(e) if !selection.allows_fallback() => return Err(e),
            Err(e) => e,
        };

        warn!("First attempt failed ({}), trying fallback download", primary);

        match self
            .run_yt_dlp(url, FALLBACK_SELECTOR, "fallback", strategy)
            .await
        {
            Ok(path) => self.validate(path, true).await,
            Err(fallback) => Err(DownloadError::AllAttemptsFailed {
                primary: primary.to_string(),
                fallback: fallback.to_string(),
            }),
        }
    }

    async fn run_yt_dlp(
        &self,
        url: &str,
        selector: &str,
        tag: &str,
        strategy: &ExtractionStrategy,
    ) -> Result<PathBuf, DownloadError> {
        let output_template = self.output_dir.join(format!("%(title)s_{}.%(ext)s", tag));

        let mut cmd = Command::new(&self.yt_dlp_path);
        cmd.args(["-f", selector])
            .args(["--merge-output-format", "mp4"])
            .args(["--restrict-filenames", "--no-playlist", "--no-warnings"])
            .args(["--no-simulate", "--print", "after_move:filepath"])
            .arg("-o")
            .arg(&output_template);

        if let Some(ref ffmpeg) = self.ffmpeg_path {
            cmd.arg("--ffmpeg-location").arg(ffmpeg);
        }

        cmd.args(strategy.to_args())
            .arg("--")
            .arg(url)
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DownloadError::ToolNotFound)
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(DownloadError::Timeout(self.timeout.as_secs())),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {}", stderr);
            return Err(DownloadError::ToolFailed {
                code: output.status.code(),
                stderr: stderr.lines().last().unwrap_or("").trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let path = reported_path(&stdout).ok_or(DownloadError::MissingOutput)?;

        if !path.exists() {
            debug!("yt-dlp reported {} but it does not exist", path.display());
            return Err(DownloadError::MissingOutput);
        }

        Ok(path)
    }

    /// Reject page assets and truncated files, deleting them.
    pub async fn validate(
        &self,
        path: PathBuf,
        fallback_used: bool,
    ) -> Result<DownloadedFile, DownloadError> {
        let filesize = tokio::fs::metadata(&path).await?.len();
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        debug!("Downloaded file: {} ({} bytes)", path.display(), filesize);

        if INVALID_EXTENSIONS.contains(&ext.as_str()) {
            tokio::fs::remove_file(&path).await?;
            return Err(DownloadError::NotAVideo(ext));
        }

        if filesize < self.min_file_size {
            tokio::fs::remove_file(&path).await?;
            return Err(DownloadError::TooSmall(filesize));
        }

        let filename = file_name(&path);
        info!("Saved {} ({} bytes)", filename, filesize);

        Ok(DownloadedFile {
            path,
            filename,
            filesize,
            fallback_used,
        })
    }
}

/// Last non-empty stdout line is the final path
fn reported_path(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(PathBuf::from)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Log when the file is far smaller than the format advertised.
pub fn check_expected_size(actual: u64, expected: Option<u64>) -> Option<f64> {
    let expected = expected.filter(|e| *e > 0)?;
    let ratio = actual as f64 / expected as f64;
    debug!("Size ratio: downloaded/expected = {:.2}", ratio);
    if ratio < 0.5 {
        warn!("Downloaded file is much smaller than expected - quality may be compromised");
    }
    Some(ratio)
}
