use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tapedeck")]
#[command(author, version, about = "Batch audio downloader: many links in, one ZIP of MP3s out", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service (default)
    Serve {
        /// Address to listen on (overrides BIND_ADDR)
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Fetch a comma-separated list of URLs and write one ZIP archive
    Batch {
        /// Comma-separated video URLs
        urls: String,

        /// Where to write the archive (defaults to ./<ARCHIVE_NAME>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Download one video at the highest progressive resolution
    Video {
        /// Video URL
        url: String,

        /// Destination directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
