// ABOUTME: Command-line interface definitions using clap
// ABOUTME: Flags override environment variables, which override defaults

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "instafeed")]
#[command(about = "Sync Instapaper bookmarks into a local cache and an Atom feed", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Instapaper username, used only when no token pair is configured
    #[arg(long)]
    pub username: Option<String>,

    /// Instapaper password
    #[arg(long)]
    pub password: Option<String>,

    /// Bookmark cache file (env: STORAGE_PATH, default instapaper.json)
    #[arg(long)]
    pub storage_path: Option<PathBuf>,

    /// Feed output file (env: FEED_PATH, default feed.xml)
    #[arg(long)]
    pub feed_path: Option<PathBuf>,

    /// API base endpoint
    #[arg(long, default_value = crate::api::DEFAULT_BASE_ENDPOINT)]
    pub api_base: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 5)]
    pub timeout_secs: u64,

    /// Retries after the first attempt of each request
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Feed title
    #[arg(long, default_value = crate::feed::DEFAULT_FEED_TITLE)]
    pub feed_title: String,

    /// Show a progress bar while fetching bookmark text
    #[arg(long)]
    pub progress: bool,
}
