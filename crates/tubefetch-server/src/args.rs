use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tubefetch")]
#[command(author, version, about = "Browse YouTube video qualities and download them")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the web service (default)
    Serve(ServeOptions),

    /// List the downloadable qualities of a video
    Formats {
        /// YouTube URL
        url: String,

        /// Show every format yt-dlp reports, unfiltered
        #[arg(long)]
        all: bool,
    },

    /// Download a video into the downloads folder
    Download {
        /// YouTube URL
        url: String,

        /// Format id from `tubefetch formats` (or a yt-dlp selector)
        #[arg(short, long, conflicts_with = "max_height")]
        format_id: Option<String>,

        /// Best stream no taller than this many pixels
        #[arg(long)]
        max_height: Option<u32>,
    },

    /// Check external tools
    Doctor,

    /// Show configuration
    Config,
}

#[derive(clap::Args, Clone, Debug, Default)]
pub struct ServeOptions {
    /// Address to bind (overrides config)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,
}
