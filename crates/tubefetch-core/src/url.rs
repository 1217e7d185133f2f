//! YouTube URL validation and video id extraction

use ::url::Url;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref YOUTUBE_RE: Regex = Regex::new(
        r"^(https?://)?(www\.)?(youtube|youtu|youtube-nocookie)\.(com|be)/(watch\?v=|embed/|v/|.+\?v=)?([^&=%?]{11})"
    )
    .unwrap();
}

/// Validate that a string looks like a YouTube video URL
pub fn validate_youtube_url(url: &str) -> bool {
    YOUTUBE_RE.is_match(url.trim())
}

/// Extract the video id from a `watch?v=` or `youtu.be/` URL
pub fn extract_video_id(url: &str) -> Option<String> {
    let url = url.trim();
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        // scheme-less input passes validation, so accept it here too
        Err(::url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{}", url)).ok()?
        }
        Err(_) => return None,
    };

    let host = parsed.host_str()?.to_lowercase();
    let id = match host.as_str() {
        "www.youtube.com" | "youtube.com" => {
            if parsed.path() != "/watch" {
                return None;
            }
            parsed
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned())
        }
        "youtu.be" => parsed
            .path_segments()
            .and_then(|mut segments| segments.next())
            .map(str::to_string),
        _ => None,
    }?;

    (!id.is_empty()).then_some(id)
}
