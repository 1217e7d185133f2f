//! Format resolution: turns the noisy yt-dlp format list into one ranked
//! entry per video height.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Lowest height considered a real video rendition.
pub const MIN_HEIGHT: u32 = 144;

/// Containers offered to the user on the primary path.
pub const VIDEO_CONTAINERS: [&str; 5] = ["mp4", "webm", "mkv", "avi", "mov"];

/// Extensions of page/storyboard assets that are never video.
pub const NON_VIDEO_EXTENSIONS: [&str; 3] = ["html", "htm", "mhtml"];

/// Protocol tag yt-dlp uses for thumbnail storyboards.
pub const STORYBOARD_PROTOCOL: &str = "mhtml";

/// yt-dlp selector used when nothing survives filtering.
pub const AUTO_FORMAT_ID: &str = "best[ext=mp4]/best";

const NO_TRACK: &str = "none";

/// One raw format entry as reported by the extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    #[serde(default, deserialize_with = "lenient_id")]
    pub format_id: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub tbr: Option<f64>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub format_note: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// yt-dlp emits string ids, other sources sometimes emit numbers.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(Option::<Id>::deserialize(deserializer)?.map(|id| match id {
        Id::Text(s) => s,
        Id::Int(n) => n.to_string(),
        Id::Float(f) => f.to_string(),
    }))
}

impl FormatDescriptor {
    /// Has a real video track.
    pub fn has_video(&self) -> bool {
        self.vcodec
            .as_deref()
            .is_some_and(|v| !v.is_empty() && v != NO_TRACK)
    }

    /// Carries no audio track.
    pub fn is_video_only(&self) -> bool {
        self.acodec
            .as_deref()
            .map_or(true, |a| a.is_empty() || a == NO_TRACK)
    }

    fn tall_enough(&self) -> bool {
        self.height.is_some_and(|h| h >= MIN_HEIGHT)
    }

    fn is_storyboard(&self) -> bool {
        self.protocol.as_deref() == Some(STORYBOARD_PROTOCOL)
    }

    fn has_page_extension(&self) -> bool {
        self.ext
            .as_deref()
            .is_some_and(|e| NON_VIDEO_EXTENSIONS.contains(&e))
    }

    fn has_video_container(&self) -> bool {
        self.ext
            .as_deref()
            .is_some_and(|e| VIDEO_CONTAINERS.contains(&e))
    }

    fn passes_primary(&self) -> bool {
        self.tall_enough()
            && self.ext.is_some()
            && self.has_video()
            && !self.is_storyboard()
            && !self.has_page_extension()
            && self.has_video_container()
    }

    fn passes_fallback(&self) -> bool {
        self.tall_enough() && self.has_video() && !self.is_storyboard() && !self.has_page_extension()
    }
}

/// A format ready for display and for a download request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedFormat {
    pub format_id: String,
    pub height: u32,
    pub ext: String,
    pub filesize: u64,
    pub format_note: String,
    pub vcodec: String,
    pub acodec: String,
    pub fps: f64,
    pub tbr: f64,
    pub protocol: String,
    pub is_video_only: bool,
    #[serde(default)]
    pub is_auto_selected: bool,
    /// Stream URL prefix; only filled in the debug listing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl RankedFormat {
    fn from_descriptor(d: &FormatDescriptor, default_ext: &str, default_note: &str) -> Self {
        Self {
            format_id: d.format_id.clone().unwrap_or_default(),
            height: d.height.unwrap_or(0),
            ext: d.ext.clone().unwrap_or_else(|| default_ext.to_string()),
            filesize: d.filesize.unwrap_or(0),
            format_note: d
                .format_note
                .clone()
                .unwrap_or_else(|| default_note.to_string()),
            vcodec: d.vcodec.clone().unwrap_or_default(),
            acodec: d.acodec.clone().unwrap_or_default(),
            fps: d.fps.unwrap_or(0.0),
            tbr: d.tbr.unwrap_or(0.0),
            protocol: d.protocol.clone().unwrap_or_default(),
            is_video_only: d.is_video_only(),
            is_auto_selected: false,
            url: None,
        }
    }

    /// Stand-in entry that lets yt-dlp pick the best stream itself.
    pub fn auto_selected() -> Self {
        Self {
            format_id: AUTO_FORMAT_ID.to_string(),
            height: 720,
            ext: "mp4".to_string(),
            filesize: 0,
            format_note: "Best available quality (auto-selected)".to_string(),
            vcodec: "unknown".to_string(),
            acodec: "unknown".to_string(),
            fps: 0.0,
            tbr: 0.0,
            protocol: "unknown".to_string(),
            is_video_only: false,
            is_auto_selected: true,
            url: None,
        }
    }

    /// Label such as "1080p".
    pub fn quality_label(&self) -> String {
        format!("{}p", self.height)
    }
}

/// Resolve raw formats into a height-descending list with one entry per
/// height. Never returns an empty list.
pub fn resolve(raw: &[FormatDescriptor]) -> Vec<RankedFormat> {
    let mut candidates: Vec<RankedFormat> = raw
        .iter()
        .filter(|d| d.passes_primary())
        .map(|d| RankedFormat::from_descriptor(d, "", ""))
        .collect();

    debug!("{} of {} formats passed the primary filter", candidates.len(), raw.len());

    if candidates.is_empty() {
        candidates = raw
            .iter()
            .filter(|d| d.passes_fallback())
            .map(|d| RankedFormat::from_descriptor(d, "mp4", "Video format"))
            .collect();
        debug!("{} formats recovered by the fallback filter", candidates.len());
    }

    // sort_by is stable, so equal (height, tbr) pairs keep source order
    candidates.sort_by(|a, b| {
        b.height
            .cmp(&a.height)
            .then_with(|| b.tbr.total_cmp(&a.tbr))
    });

    let mut seen = HashSet::new();
    candidates.retain(|f| seen.insert(f.height));

    if candidates.is_empty() {
        debug!("No usable formats, substituting auto-selected entry");
        candidates.push(RankedFormat::auto_selected());
    }

    candidates
}

/// Every format, unfiltered, tallest first. Used by the debug endpoints.
pub fn list_all(raw: &[FormatDescriptor]) -> Vec<RankedFormat> {
    let mut all: Vec<RankedFormat> = raw
        .iter()
        .map(|d| RankedFormat {
            url: d.url.as_deref().map(truncate_url),
            ..RankedFormat::from_descriptor(d, "", "")
        })
        .collect();
    all.sort_by(|a, b| b.height.cmp(&a.height));
    all
}

fn truncate_url(url: &str) -> String {
    const SHOWN: usize = 100;
    match url.char_indices().nth(SHOWN) {
        Some((cut, _)) => format!("{}...", &url[..cut]),
        None => url.to_string(),
    }
}
