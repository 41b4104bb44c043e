//! WSAL Shipper - Main entry point

use clap::Parser;
use std::process;
use tracing::{debug, error};
use wsal_common::logging::{init_logging, LogConfig, LogLevel};
use wsal_shipper::{
    source::MySqlAuditSource, storage::S3Store, Cli, Config, Result, RunOutcome, ShipperContext,
    ShipperError,
};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Secrets may live in a .env file next to the config
    dotenvy::dotenv().ok();

    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        })
        .log_file_prefix("wsal-shipper")
        .filter_directives("sqlx=warn,aws_config=warn,aws_smithy_runtime=warn,hyper=warn")
        .build();

    // Merge with environment variables (they take precedence)
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The shipper still runs when logging cannot be set up
    let log_guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        }
    };

    let code = match execute(&cli).await {
        Ok(outcome) => {
            println!("{}", outcome.status_line());
            0
        }
        Err(e) => {
            error!(error = %e, "Run failed");
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };

    // Flush file logs before exiting
    drop(log_guard);
    process::exit(code);
}

/// Load configuration, connect and run the pipeline once
async fn execute(cli: &Cli) -> Result<RunOutcome> {
    let config = Config::load(&cli.base_dir, &cli.config)?;
    debug!(?config, "Configuration loaded");

    let hostname = hostname::get()
        .map_err(|e| ShipperError::Other(anyhow::anyhow!("Failed to get hostname: {}", e)))?
        .to_string_lossy()
        .into_owned();

    let ctx = ShipperContext::new(config, cli.config.clone(), cli.base_dir.clone(), hostname);

    let source = MySqlAuditSource::connect(&ctx.config.database).await?;
    let store = S3Store::new(&ctx.config.storage);

    let result = wsal_shipper::run(&ctx, &source, &store, cli.dry_run).await;
    source.close().await;

    result
}
