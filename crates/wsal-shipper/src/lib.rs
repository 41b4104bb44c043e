//! WSAL Shipper Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Incrementally exports WordPress security audit logs (WP Activity Log tables)
//! to an S3 bucket.
//!
//! # Overview
//!
//! Each run picks up where the previous one stopped:
//!
//! - **Offset**: read the last shipped event id from `log_track_<config>` ([`offset`])
//! - **Query**: fetch newer occurrences and their metadata ([`source`])
//! - **Join**: flatten each occurrence with its metadata ([`join`])
//! - **Export**: write `logs/wp-audit-logs-<config>-<id>.json` and upload it ([`export`])
//! - **Commit**: advance the offset once the upload is confirmed ([`pipeline`])

pub mod config;
pub mod context;
pub mod error;
pub mod export;
pub mod join;
pub mod models;
pub mod offset;
pub mod pipeline;
pub mod source;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use context::ShipperContext;
pub use error::{Result, ShipperError};
pub use pipeline::{run, RunOutcome};

use clap::Parser;
use std::path::PathBuf;

/// Ships WordPress security audit logs to an S3 bucket.
#[derive(Parser, Debug)]
#[command(name = "wsal-shipper")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Name of the config file to use, without the .toml extension
    #[arg(
        short = 'c',
        long = "config",
        default_value = config::DEFAULT_CONFIG_NAME,
        value_parser = parse_config_name
    )]
    pub config: String,

    /// Do not update the logs delta and do not ship it to S3
    #[arg(long)]
    pub dry_run: bool,

    /// Directory holding config files, the offset marker and exported logs
    #[arg(long, env = "WSAL_BASE_DIR", default_value = ".")]
    pub base_dir: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Config names end up in file names, so keep them to a single path component
fn parse_config_name(name: &str) -> std::result::Result<String, String> {
    let name = name.strip_suffix(".toml").unwrap_or(name);
    if name.is_empty() {
        return Err("config name cannot be empty".to_string());
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(format!(
            "'{}' is not a config name; use --base-dir to point at another directory",
            name
        ));
    }
    Ok(name.to_string())
}
