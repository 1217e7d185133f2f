use crate::args::ServeOptions;
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path as AxumPath, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use mime_guess::MimeGuess;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::{fs::File, signal};
use tokio_util::io::ReaderStream;
use tracing::{error, info, info_span, warn, Instrument};
use tubefetch_core::config::Config;
use tubefetch_core::downloader::Selection;
use tubefetch_core::error::{ExtractError, FailedAttempt, StorageError};
use tubefetch_core::extractor::YtDlpExtractor;
use tubefetch_core::service::{
    DownloadSummary, FormatDump, FormatTrial, SelfCheck, VideoService, VideoSummary,
};
use tubefetch_core::store::StrategyStats;
use tubefetch_core::storage::StoredFile;
use tubefetch_core::TubeFetchError;
use uuid::Uuid;

const DEFAULT_FORMAT_ID: &str = "best";
const CAPPED_HEIGHT: u32 = 1080;

#[derive(Clone)]
struct AppState {
    service: Arc<VideoService>,
    yt_dlp_version: Option<Arc<str>>,
}

pub async fn run(options: &ServeOptions, config_path: Option<&Path>) -> Result<()> {
    let mut config = Config::load(config_path)?;
    if let Some(ref host) = options.host {
        config.server.host = host.clone();
    }
    if let Some(port) = options.port {
        config.server.port = port;
    }

    let yt_dlp_path = config.yt_dlp_path()?;
    let yt_dlp_version = YtDlpExtractor::new(yt_dlp_path.clone(), Duration::from_secs(10))
        .version()
        .await;
    match yt_dlp_version {
        Some(ref v) => info!("yt-dlp {} at {}", v, yt_dlp_path.display()),
        None => warn!("yt-dlp at {} did not report a version", yt_dlp_path.display()),
    }

    let service = VideoService::from_config(&config)?;
    service
        .storage()
        .ensure_ready()
        .await
        .context("downloads folder is not usable")?;
    info!("Downloads folder: {}", service.storage().root().display());

    let strategies: Vec<&str> = service
        .cascade()
        .strategies()
        .iter()
        .map(|s| s.name.as_str())
        .collect();
    info!("Extraction strategies: {}", strategies.join(", "));

    let state = AppState {
        service: Arc::new(service),
        yt_dlp_version: yt_dlp_version.map(Arc::from),
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/get_video_info", post(get_video_info))
        .route("/download_video", post(download_video))
        .route("/download_1080p", post(download_1080p))
        .route("/download_file/{filename}", get(download_file))
        .route("/cleanup/{filename}", delete(cleanup))
        .route("/debug_formats", post(debug_formats))
        .route("/test_format", post(format_trial))
        .route("/test_yt_dlp", get(yt_dlp_check))
        .route("/debug", get(debug))
        .route("/health", get(health))
        .layer(middleware::from_fn(request_span))
        .with_state(state)
}

async fn request_span(req: Request, next: Next) -> Response {
    let span = info_span!(
        "request",
        id = %Uuid::new_v4(),
        method = %req.method(),
        path = %req.uri().path()
    );
    next.run(req).instrument(span).await
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", err);
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
    attempts: Vec<FailedAttempt>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            attempts: Vec::new(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<TubeFetchError> for ApiError {
    fn from(err: TubeFetchError) -> Self {
        let status = match &err {
            TubeFetchError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            TubeFetchError::Storage(StorageError::InvalidName(_)) => StatusCode::BAD_REQUEST,
            TubeFetchError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            TubeFetchError::Extract(ExtractError::Exhausted { .. }) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("{}", err);
        } else {
            warn!("{}", err);
        }
        let attempts = match &err {
            TubeFetchError::Extract(ExtractError::Exhausted { attempts }) => attempts.clone(),
            _ => Vec::new(),
        };
        Self {
            status,
            message: err.to_string(),
            attempts,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        TubeFetchError::from(err).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = serde_json::json!({
            "error": self.message,
        });
        if !self.attempts.is_empty() {
            body["attempts"] = serde_json::json!(self.attempts);
        }
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
struct UrlRequest {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct DownloadRequest {
    #[serde(default)]
    url: String,
    #[serde(default)]
    format_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct FormatTrialResponse {
    success: bool,
    #[serde(flatten)]
    trial: FormatTrial,
}

#[derive(Debug, Serialize)]
struct SelfCheckResponse {
    status: &'static str,
    message: &'static str,
    #[serde(flatten)]
    check: SelfCheck,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct DownloadResponse {
    success: bool,
    #[serde(flatten)]
    summary: DownloadSummary,
}

#[derive(Debug, Serialize)]
struct CappedDownloadResponse {
    success: bool,
    filename: String,
    title: String,
    filesize: u64,
    quality: String,
}

#[derive(Debug, Serialize)]
struct SuccessResponse {
    success: bool,
}

#[derive(Debug, Serialize)]
struct DebugResponse {
    version: &'static str,
    yt_dlp_version: Option<String>,
    downloads: DownloadsStatus,
    strategies: Vec<String>,
    strategy_stats: Vec<StrategyStats>,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct DownloadsStatus {
    directory: String,
    exists: bool,
    writable: bool,
    files: Vec<StoredFile>,
}

async fn get_video_info(
    State(state): State<AppState>,
    payload: Result<Json<UrlRequest>, JsonRejection>,
) -> ApiResult<Json<VideoSummary>> {
    let Json(req) = payload?;
    info!("Video info requested for {}", req.url);
    Ok(Json(state.service.video_info(&req.url).await?))
}

async fn download_video(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> ApiResult<Json<DownloadResponse>> {
    let Json(req) = payload?;
    let format_id = req
        .format_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FORMAT_ID.to_string());
    info!("Download requested for {} (format {})", req.url, format_id);

    let summary = state
        .service
        .download(&req.url, &Selection::Format(format_id))
        .await?;

    Ok(Json(DownloadResponse {
        success: true,
        summary,
    }))
}

async fn download_1080p(
    State(state): State<AppState>,
    payload: Result<Json<UrlRequest>, JsonRejection>,
) -> ApiResult<Json<CappedDownloadResponse>> {
    let Json(req) = payload?;
    info!("{}p download requested for {}", CAPPED_HEIGHT, req.url);

    let summary = state
        .service
        .download(&req.url, &Selection::CappedHeight(CAPPED_HEIGHT))
        .await?;

    let capped = format!("{}p", CAPPED_HEIGHT);
    let quality = if summary.selected_quality == capped {
        capped
    } else {
        "Best available".to_string()
    };

    Ok(Json(CappedDownloadResponse {
        success: true,
        filename: summary.file.filename,
        title: summary.title,
        filesize: summary.file.filesize,
        quality,
    }))
}

async fn download_file(
    State(state): State<AppState>,
    AxumPath(filename): AxumPath<String>,
) -> ApiResult<Response> {
    let path = state.service.storage().resolve(&filename).await?;
    let file = File::open(&path)
        .await
        .map_err(|e| ApiError::from(StorageError::Io(e)))?;
    let length = file
        .metadata()
        .await
        .map_err(|e| ApiError::from(StorageError::Io(e)))?
        .len();

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .map_err(|_| ApiError::bad_request(format!("Invalid file name: {}", filename)))?;
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, content_type(&path));
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));

    info!("Serving {} ({} bytes)", filename, length);
    let body = Body::from_stream(ReaderStream::new(file));
    Ok((headers, body).into_response())
}

fn content_type(path: &Path) -> HeaderValue {
    let mime = MimeGuess::from_path(path).first_or_octet_stream();
    HeaderValue::from_str(mime.as_ref())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
}

async fn cleanup(
    State(state): State<AppState>,
    AxumPath(filename): AxumPath<String>,
) -> ApiResult<Json<SuccessResponse>> {
    state.service.storage().remove(&filename).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn debug_formats(
    State(state): State<AppState>,
    payload: Result<Json<UrlRequest>, JsonRejection>,
) -> ApiResult<Json<FormatDump>> {
    let Json(req) = payload?;
    Ok(Json(state.service.debug_formats(&req.url).await?))
}

async fn format_trial(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> ApiResult<Json<FormatTrialResponse>> {
    let Json(req) = payload?;
    let format_id = req
        .format_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FORMAT_ID.to_string());
    info!("Format trial requested for {} (format {})", req.url, format_id);

    let trial = state.service.try_format(&req.url, &format_id).await?;
    Ok(Json(FormatTrialResponse {
        success: true,
        trial,
    }))
}

async fn yt_dlp_check(State(state): State<AppState>) -> ApiResult<Json<SelfCheckResponse>> {
    let check = state.service.self_check().await?;
    Ok(Json(SelfCheckResponse {
        status: "ok",
        message: "yt-dlp is working",
        check,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

async fn debug(State(state): State<AppState>) -> ApiResult<Json<DebugResponse>> {
    let storage = state.service.storage();
    let exists = storage.exists();
    let writable = exists && storage.ensure_ready().await.is_ok();
    let files = storage.list().await?;

    let cascade = state.service.cascade();
    Ok(Json(DebugResponse {
        version: env!("CARGO_PKG_VERSION"),
        yt_dlp_version: state.yt_dlp_version.as_deref().map(str::to_string),
        downloads: DownloadsStatus {
            directory: storage.root().display().to_string(),
            exists,
            writable,
            files,
        },
        strategies: cascade.strategies().iter().map(|s| s.name.clone()).collect(),
        strategy_stats: cascade.store().stats(),
        timestamp: Utc::now().to_rfc3339(),
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use serde_json::Value;
    use std::path::PathBuf;
    use tempfile::tempdir;
    use tubefetch_core::extractor::{Extractor, VideoInfo};
    use tubefetch_core::formats::FormatDescriptor;
    use tubefetch_core::strategy::ExtractionStrategy;

    struct StubExtractor(Option<VideoInfo>);

    #[async_trait]
    impl Extractor for StubExtractor {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn extract(
            &self,
            _url: &str,
            _strategy: &ExtractionStrategy,
        ) -> Result<VideoInfo, ExtractError> {
            self.0
                .clone()
                .ok_or_else(|| ExtractError::VideoUnavailable("private video".to_string()))
        }
    }

    fn sample_info() -> VideoInfo {
        VideoInfo {
            id: "dQw4w9WgXcQ".into(),
            title: "Sample".into(),
            duration: Some(60.0),
            thumbnail: Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg".into()),
            formats: vec![
                FormatDescriptor {
                    format_id: Some("sb0".into()),
                    ext: Some("mhtml".into()),
                    protocol: Some("mhtml".into()),
                    vcodec: Some("none".into()),
                    ..Default::default()
                },
                FormatDescriptor {
                    format_id: Some("22".into()),
                    height: Some(720),
                    ext: Some("mp4".into()),
                    vcodec: Some("avc1".into()),
                    acodec: Some("mp4a".into()),
                    tbr: Some(1500.0),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    fn state(info: Option<VideoInfo>, dir: &Path) -> AppState {
        let mut config = Config::default();
        config.downloads.directory = dir.to_path_buf();
        let service = VideoService::with_extractor(
            &config,
            Arc::new(StubExtractor(info)),
            PathBuf::from("/nonexistent/yt-dlp-binary"),
        );
        AppState {
            service: Arc::new(service),
            yt_dlp_version: Some(Arc::from("2024.12.13")),
        }
    }

    /// yt-dlp stand-in that writes a 2 KiB mp4 for any selector except
    /// those matching the shell pattern `fail`.
    #[cfg(unix)]
    fn fake_yt_dlp(dir: &Path, fail: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = format!(
            r#"#!/bin/sh
sel=""
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -f) sel="$2"; shift ;;
    -o) out="$2"; shift ;;
  esac
  shift
done
case "$sel" in
  {fail}) echo "ERROR: Requested format is not available" >&2; exit 1 ;;
esac
if [ "$sel" = "best[ext=mp4]/best" ]; then name=Sample_fallback.mp4; else name=Sample_primary.mp4; fi
dir=$(dirname "$out")
head -c 2048 /dev/zero > "$dir/$name"
echo "$dir/$name"
"#,
            fail = fail
        );
        let path = dir.join("yt-dlp");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    fn scripted_state(info: VideoInfo, dir: &Path, fail: &str) -> AppState {
        let mut config = Config::default();
        config.downloads.directory = dir.join("downloads");
        config.downloads.min_file_size = 16;
        let service = VideoService::with_extractor(
            &config,
            Arc::new(StubExtractor(Some(info))),
            fake_yt_dlp(dir, fail),
        );
        AppState {
            service: Arc::new(service),
            yt_dlp_version: None,
        }
    }

    fn info_with_1080p() -> VideoInfo {
        let mut info = sample_info();
        info.formats.push(FormatDescriptor {
            format_id: Some("137".into()),
            height: Some(1080),
            ext: Some("mp4".into()),
            vcodec: Some("avc1".into()),
            acodec: Some("none".into()),
            tbr: Some(4400.0),
            filesize: Some(8192),
            ..Default::default()
        });
        info
    }

    fn url_request(url: &str) -> Result<Json<UrlRequest>, JsonRejection> {
        Ok(Json(UrlRequest {
            url: url.to_string(),
        }))
    }

    async fn error_body(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_video_info_returns_ranked_formats() {
        let dir = tempdir().unwrap();
        let state = state(Some(sample_info()), dir.path());

        let Json(summary) = get_video_info(
            State(state),
            url_request("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
        )
        .await
        .unwrap();

        assert_eq!(summary.title, "Sample");
        assert_eq!(summary.formats.len(), 1);
        assert_eq!(summary.formats[0].format_id, "22");
    }

    #[tokio::test]
    async fn test_missing_url_is_bad_request() {
        let dir = tempdir().unwrap();
        let state = state(Some(sample_info()), dir.path());

        let err = get_video_info(State(state), url_request(""))
            .await
            .unwrap_err();
        let (status, body) = error_body(err).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Please provide a YouTube URL");
    }

    #[tokio::test]
    async fn test_non_youtube_url_is_bad_request() {
        let dir = tempdir().unwrap();
        let state = state(Some(sample_info()), dir.path());

        let err = debug_formats(State(state), url_request("https://vimeo.com/123"))
            .await
            .unwrap_err();
        let (status, body) = error_body(err).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Please provide a valid YouTube URL");
    }

    #[tokio::test]
    async fn test_exhausted_cascade_is_bad_gateway() {
        let dir = tempdir().unwrap();
        let state = state(None, dir.path());

        let err = get_video_info(State(state), url_request("https://youtu.be/dQw4w9WgXcQ"))
            .await
            .unwrap_err();
        let (status, body) = error_body(err).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("extraction strategies failed"));
        assert!(message.contains("Video unavailable or private"));
        let attempts = body["attempts"].as_array().unwrap();
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[0]["strategy"], "standard");
        assert!(attempts[2]["error"]
            .as_str()
            .unwrap()
            .contains("private video"));
    }

    #[tokio::test]
    async fn test_plain_errors_have_no_attempts() {
        let (_, body) = error_body(ApiError::bad_request("nope")).await;
        assert_eq!(body, serde_json::json!({ "error": "nope" }));
    }

    #[tokio::test]
    async fn test_download_file_streams_attachment() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Sample_22.mp4"), b"not really a video").unwrap();
        let state = state(None, dir.path());

        let response = download_file(State(state), AxumPath("Sample_22.mp4".to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Sample_22.mp4\""
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"not really a video");
    }

    #[tokio::test]
    async fn test_download_file_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let state = state(None, dir.path());

        let err = download_file(State(state), AxumPath("nope.mp4".to_string()))
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_download_file_rejects_traversal() {
        let dir = tempdir().unwrap();
        let state = state(None, dir.path());

        let err = download_file(State(state), AxumPath("../secret.mp4".to_string()))
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cleanup_removes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Sample_22.mp4");
        std::fs::write(&path, b"data").unwrap();
        let state = state(None, dir.path());

        let Json(resp) = cleanup(State(state.clone()), AxumPath("Sample_22.mp4".to_string()))
            .await
            .unwrap();
        assert!(resp.success);
        assert!(!path.exists());

        let err = cleanup(State(state), AxumPath("Sample_22.mp4".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_debug_reports_folder_and_strategies() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Sample_22.mp4"), b"data").unwrap();
        let state = state(None, dir.path());

        let Json(report) = debug(State(state)).await.unwrap();

        assert_eq!(report.yt_dlp_version.as_deref(), Some("2024.12.13"));
        assert!(report.downloads.exists);
        assert!(report.downloads.writable);
        assert_eq!(report.downloads.files.len(), 1);
        assert_eq!(report.strategies, vec!["standard", "resilient", "ipv4"]);
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
    }

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    #[tokio::test]
    async fn test_download_file_guesses_content_type() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Sample_18.mov"), b"moov").unwrap();
        std::fs::write(dir.path().join("Sample_43.webm"), b"webm").unwrap();
        std::fs::write(dir.path().join("notes.unknownext"), b"??").unwrap();
        let state = state(None, dir.path());

        let mov = download_file(State(state.clone()), AxumPath("Sample_18.mov".to_string()))
            .await
            .unwrap();
        assert_eq!(mov.headers()[header::CONTENT_TYPE], "video/quicktime");

        let webm = download_file(State(state.clone()), AxumPath("Sample_43.webm".to_string()))
            .await
            .unwrap();
        assert_eq!(webm.headers()[header::CONTENT_TYPE], "video/webm");

        let other = download_file(State(state), AxumPath("notes.unknownext".to_string()))
            .await
            .unwrap();
        assert_eq!(
            other.headers()[header::CONTENT_TYPE],
            "application/octet-stream"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_download_1080p_reports_1080p() {
        let dir = tempdir().unwrap();
        let state = scripted_state(info_with_1080p(), dir.path(), "'__never__'");

        let Json(resp) = download_1080p(State(state), url_request(URL)).await.unwrap();

        assert!(resp.success);
        assert_eq!(resp.quality, "1080p");
        assert_eq!(resp.title, "Sample");
        assert_eq!(resp.filename, "Sample_primary.mp4");
        assert_eq!(resp.filesize, 2048);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_download_1080p_without_1080p_format() {
        let dir = tempdir().unwrap();
        let state = scripted_state(sample_info(), dir.path(), "'__never__'");

        let Json(resp) = download_1080p(State(state), url_request(URL)).await.unwrap();

        assert_eq!(resp.quality, "Best available");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_download_1080p_fallback_is_best_available() {
        let dir = tempdir().unwrap();
        let state = scripted_state(info_with_1080p(), dir.path(), "best\\[height*");

        let Json(resp) = download_1080p(State(state), url_request(URL)).await.unwrap();

        assert_eq!(resp.filename, "Sample_fallback.mp4");
        assert_eq!(resp.quality, "Best available");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_download_video_defaults_to_best() {
        let dir = tempdir().unwrap();
        let state = scripted_state(sample_info(), dir.path(), "'__never__'");

        let Json(resp) = download_video(
            State(state),
            Ok(Json(DownloadRequest {
                url: URL.to_string(),
                format_id: None,
            })),
        )
        .await
        .unwrap();

        let body = serde_json::to_value(&resp).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["filename"], "Sample_primary.mp4");
        assert_eq!(body["fallback_used"], false);
        assert_eq!(body["selected_quality"], "Unknown");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_format_trial_route() {
        let dir = tempdir().unwrap();
        let state = scripted_state(info_with_1080p(), dir.path(), "'__never__'");

        let Json(resp) = format_trial(
            State(state),
            Ok(Json(DownloadRequest {
                url: URL.to_string(),
                format_id: Some("137".into()),
            })),
        )
        .await
        .unwrap();

        let body = serde_json::to_value(&resp).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["filename"], "Sample_primary.mp4");
        assert_eq!(body["format_info"]["height"], 1080);
        assert_eq!(body["format_info"]["expected_size"], 8192);
        assert_eq!(body["format_info"]["codec"], "avc1");
    }

    #[tokio::test]
    async fn test_format_trial_unknown_format() {
        let dir = tempdir().unwrap();
        let state = state(Some(sample_info()), dir.path());

        let err = format_trial(
            State(state),
            Ok(Json(DownloadRequest {
                url: URL.to_string(),
                format_id: Some("999".into()),
            })),
        )
        .await
        .unwrap_err();
        let (status, body) = error_body(err).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Format 999 not found");
    }

    #[tokio::test]
    async fn test_yt_dlp_check_route() {
        let dir = tempdir().unwrap();
        let state = state(Some(sample_info()), dir.path());

        let Json(resp) = yt_dlp_check(State(state)).await.unwrap();

        let body = serde_json::to_value(&resp).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["title"], "Sample");
        assert_eq!(body["formats_count"], 2);
        assert_eq!(
            body["test_url"],
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[tokio::test]
    async fn test_yt_dlp_check_failure() {
        let dir = tempdir().unwrap();
        let state = state(None, dir.path());

        let err = yt_dlp_check(State(state)).await.unwrap_err();

        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.attempts.len(), 3);
    }

    #[tokio::test]
    async fn test_debug_reports_missing_folder() {
        let dir = tempdir().unwrap();
        let state = state(None, &dir.path().join("not-created"));

        let Json(report) = debug(State(state)).await.unwrap();

        assert!(!report.downloads.exists);
        assert!(!report.downloads.writable);
        assert!(report.downloads.files.is_empty());
    }
}
