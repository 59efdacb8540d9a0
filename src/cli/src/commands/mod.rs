//! CLI command definitions and dispatch.

mod chain;
mod cleanup;
mod create;
mod exists;
mod inspect;
mod ls;
mod refs;
mod rm;
mod status;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use strata_core::{LogConfig, LogFormat, LogLevel, StoreConfig};
use strata_runtime::{LayerStore, StrataDriver};

/// Strata - copy-on-write layer store.
#[derive(Parser)]
#[command(name = "strata", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command.
#[derive(Args)]
pub struct GlobalArgs {
    /// Layer store root (overrides config file and STRATA_ROOT)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Store configuration file (.yaml, .yml or .json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level: debug, info, warn, error [default: from config, else info]
    #[arg(long, global = true)]
    pub log_level: Option<LogLevel>,

    /// Log format: text, json [default: from config, else text]
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Create a layer, optionally on top of a parent
    Create(create::CreateArgs),
    /// Remove an unpinned layer
    Rm(rm::RmArgs),
    /// Check whether a layer exists
    Exists(exists::ExistsArgs),
    /// Print a layer's ancestry, leaf first
    Chain(chain::ChainArgs),
    /// List layers
    Ls(ls::LsArgs),
    /// Display detailed layer information as JSON
    Inspect(inspect::InspectArgs),
    /// Manage layer references
    Ref(refs::RefArgs),
    /// Show driver status
    Status(status::StatusArgs),
    /// Remove leftovers of interrupted removals
    Cleanup(cleanup::CleanupArgs),
}

/// Build the store configuration from the global options.
///
/// Precedence: `--root`, then `STRATA_ROOT`, then the config file, then
/// the built-in default.
pub fn load_config(global: &GlobalArgs) -> Result<StoreConfig, Box<dyn std::error::Error>> {
    let config = match &global.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };
    let mut config = config.with_env_overrides();
    if let Some(root) = &global.root {
        config.root = root.clone();
    }
    Ok(config)
}

/// Logging settings: command-line flags override the config file.
///
/// `RUST_LOG` is applied on top of the result when the subscriber is built.
pub fn log_settings(global: &GlobalArgs, config: &LogConfig) -> LogConfig {
    LogConfig {
        level: global.log_level.unwrap_or(config.level),
        format: global.log_format.unwrap_or(config.format),
    }
}

/// Open the driver for an already loaded configuration.
pub fn open_driver(config: &StoreConfig) -> Result<StrataDriver, Box<dyn std::error::Error>> {
    let store = LayerStore::open(config)?;
    Ok(StrataDriver::new(Arc::new(store)))
}

/// Dispatch a parsed CLI command to its handler.
pub async fn dispatch(cli: Cli, config: StoreConfig) -> Result<(), Box<dyn std::error::Error>> {
    let driver = open_driver(&config)?;
    match cli.command {
        Command::Create(args) => create::execute(&driver, args).await,
        Command::Rm(args) => rm::execute(&driver, args).await,
        Command::Exists(args) => exists::execute(&driver, args).await,
        Command::Chain(args) => chain::execute(&driver, args).await,
        Command::Ls(args) => ls::execute(&driver, args).await,
        Command::Inspect(args) => inspect::execute(&driver, args).await,
        Command::Ref(args) => refs::execute(&driver, args).await,
        Command::Status(args) => status::execute(&driver, args).await,
        Command::Cleanup(args) => cleanup::execute(&driver, args).await,
    }
}
