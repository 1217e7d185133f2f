use anyhow::Result;
use std::path::Path;
use tubefetch_core::config::Config;
use tubefetch_core::service::VideoService;
use tubefetch_core::RankedFormat;

pub async fn run(url: &str, all: bool, config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;
    let service = VideoService::from_config(&config)?;

    if all {
        let dump = service.debug_formats(url).await?;
        println!("{}\n", dump.title);
        println!("{} formats reported\n", dump.total_formats);
        print_table(&dump.formats);
        return Ok(());
    }

    let summary = service.video_info(url).await?;
    println!("{}", summary.title);
    println!(
        "Duration: {}  Strategy: {}\n",
        format_duration(summary.duration),
        summary.strategy
    );
    print_table(&summary.formats);
    println!("\nDownload with: tubefetch download {} --format-id <ID>", url);

    Ok(())
}

fn print_table(formats: &[RankedFormat]) {
    println!(
        "{:<22} {:>7} {:<5} {:>10} {:>8}  {}",
        "ID", "QUALITY", "EXT", "SIZE", "TBR", "NOTE"
    );
    for f in formats {
        let quality = if f.height > 0 {
            f.quality_label()
        } else {
            "-".to_string()
        };
        let mut note = f.format_note.clone();
        if f.is_video_only {
            note.push_str(" (video only, audio merged)");
        }
        println!(
            "{:<22} {:>7} {:<5} {:>10} {:>8.0}  {}",
            f.format_id,
            quality,
            f.ext,
            format_size(f.filesize),
            f.tbr,
            note
        );
    }
}

fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "?".to_string();
    }
    let mb = bytes as f64 / (1024.0 * 1024.0);
    if mb >= 1024.0 {
        format!("{:.2} GiB", mb / 1024.0)
    } else {
        format!("{:.1} MiB", mb)
    }
}

fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}
