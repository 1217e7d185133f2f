use anyhow::Result;
use std::path::Path;
use std::process::Command;
use tubefetch_core::config::Config;
use tubefetch_core::storage::Storage;

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;

    println!("tubefetch dependency check\n");

    let mut all_ok = true;

    print!("yt-dlp:     ");
    match config.yt_dlp_path() {
        Ok(path) => match Command::new(&path).arg("--version").output() {
            Ok(out) if out.status.success() => {
                let v = String::from_utf8_lossy(&out.stdout);
                println!("OK ({}, {})", v.trim(), path.display());
            }
            _ => {
                println!("FOUND but failed to get version ({})", path.display());
                all_ok = false;
            }
        },
        Err(_) => {
            println!("NOT FOUND");
            println!("            Install with: pip install yt-dlp");
            all_ok = false;
        }
    }

    print!("ffmpeg:     ");
    match config.ffmpeg_path() {
        Some(path) => match Command::new(&path).arg("-version").output() {
            Ok(out) => {
                let first_line = String::from_utf8_lossy(&out.stdout)
                    .lines()
                    .next()
                    .unwrap_or("")
                    .to_string();
                let version_part = first_line.split_whitespace().nth(2).unwrap_or("unknown");
                println!("OK ({})", version_part);
            }
            Err(_) => {
                println!("FOUND but failed to get version");
                all_ok = false;
            }
        },
        None => {
            // progressive formats still download; merging needs ffmpeg
            println!("NOT FOUND (video-only formats cannot be merged with audio)");
            println!("            Install with: apt install ffmpeg / brew install ffmpeg");
            all_ok = false;
        }
    }

    print!("downloads:  ");
    let storage = Storage::new(config.downloads.directory.clone());
    match storage.ensure_ready().await {
        Ok(()) => println!("OK ({})", storage.root().display()),
        Err(e) => {
            println!("{}", e);
            all_ok = false;
        }
    }

    println!();
    if all_ok {
        println!("All dependencies OK!");
    } else {
        println!("Some dependencies are missing. See above for installation instructions.");
    }

    Ok(())
}
