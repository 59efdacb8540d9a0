//! Strata CLI entry point.

use clap::Parser;
use strata_core::{LogConfig, LogFormat};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use strata_cli::commands::{dispatch, load_config, log_settings, Cli};

fn init_tracing(log: &LogConfig) {
    // RUST_LOG wins over the configured level
    let default_level = LevelFilter::from_level(log.level.into());
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = load_config(&cli.global);
    let file_log = config.as_ref().map(|c| c.log.clone()).unwrap_or_default();
    init_tracing(&log_settings(&cli.global, &file_log));

    let result = match config {
        Ok(config) => dispatch(cli, config).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
