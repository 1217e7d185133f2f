use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tubefetch_core::config::Config;
use tubefetch_core::downloader::Selection;
use tubefetch_core::service::VideoService;

pub async fn run(
    url: &str,
    format_id: Option<String>,
    max_height: Option<u32>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = Config::load(config_path)?;
    let service = VideoService::from_config(&config)?;
    let selection = selection(format_id, max_height);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template(
        "{spinner:.cyan} [{elapsed_precise}] {msg}",
    )?);
    pb.set_message(format!("Downloading {} ({})", url, selection.selector()));
    pb.enable_steady_tick(Duration::from_millis(120));

    let result = service.download(url, &selection).await;
    pb.finish_and_clear();
    let summary = result?;

    let path = service.storage().root().join(&summary.file.filename);
    println!("{}", summary.title);
    println!("  Saved:   {}", path.display());
    println!(
        "  Size:    {:.1} MiB",
        summary.file.filesize as f64 / (1024.0 * 1024.0)
    );
    println!("  Quality: {}", summary.selected_quality);
    if summary.file.fallback_used {
        println!("  Note:    requested format failed, fell back to best available");
    }

    Ok(())
}

fn selection(format_id: Option<String>, max_height: Option<u32>) -> Selection {
    match (format_id, max_height) {
        (Some(id), _) => Selection::Format(id),
        (None, Some(h)) => Selection::CappedHeight(h),
        (None, None) => Selection::Format("best".to_string()),
    }
}
