//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser};

use crate::commands::Command;

/// Stitch CLI tool for app backend exploration.
#[derive(Parser, Debug)]
#[command(name = "stitch")]
#[command(author, version = env!("STITCH_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(flatten)]
    pub app: AppArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Which app to talk to, and where to keep its session.
#[derive(Args, Debug, Clone)]
pub struct AppArgs {
    /// Client app id
    #[arg(long, env = "STITCH_APP_ID", global = true)]
    pub app_id: Option<String>,

    /// Backend base URL
    #[arg(
        long,
        env = "STITCH_BASE_URL",
        global = true,
        default_value = stitch_core::BaseUrl::DEFAULT
    )]
    pub base_url: String,

    /// Directory holding persisted sessions
    #[arg(long, env = "STITCH_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,
}
