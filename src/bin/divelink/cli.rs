use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Dive computer downloader
#[derive(Parser, Debug)]
#[command(name = "divelink", version, about = "Download and decode dive computer logs")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// List drivers and the configuration keys they read
    Drivers {
        #[arg(long)]
        json: bool,
    },
    /// Download dives from a connected computer
    Download(DownloadArgs),
    /// Decode a saved Shearwater-style log image
    Decode {
        #[arg(long)]
        file: PathBuf,
        /// Check the trailer checksum before decoding
        #[arg(long)]
        verify: bool,
        #[arg(long)]
        json: bool,
    },
    /// Replay a saved Suunto memory image through the paged cache
    Replay {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        clock_offset: i64,
        #[arg(long)]
        json: bool,
    },
    /// Print process metrics as JSON
    Metrics,
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    #[arg(long)]
    pub driver: String,
    /// Serial device; falls back to DIVELINK_PORT
    #[arg(long)]
    pub port: Option<PathBuf>,
    #[arg(long)]
    pub model: Option<String>,
    /// Download every dive, not only new ones
    #[arg(long)]
    pub all: bool,
    /// Number of the newest dive already imported
    #[arg(long)]
    pub last_number: Option<u32>,
    /// Start time (Unix seconds) of the newest dive already imported
    #[arg(long, requires = "last_number")]
    pub last_start: Option<i64>,
    /// Seconds added to every start time
    #[arg(long, allow_hyphen_values = true)]
    pub clock_offset: Option<i64>,
    /// Save the raw memory image here
    #[arg(long)]
    pub dump: Option<PathBuf>,
    /// Log every byte on the wire (needs RUST_LOG=divelink=trace)
    #[arg(short = 'v', long)]
    pub trace_bytes: bool,
    #[arg(long)]
    pub json: bool,
}
