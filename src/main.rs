//! config-aggregator
//!
//! Loads layered configuration (tier files, environment overrides) and prints
//! the merged tree or a single value.

use anyhow::{Result, anyhow};
use clap::Parser;
use config_aggregator::cli::{Cli, Command};
use config_aggregator::format::render;
use config_aggregator::logging::{LogOutput, init_logging};
use config_aggregator::{Config, ConfigOptions};
use serde_json::Value;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&LogOutput::parse(&cli.log), cli.verbose)?;

    let config = Config::new(ConfigOptions {
        config_dir: cli.config_dir,
        env_prefix: cli.prefix,
        app_env: cli.env,
        env_file: Some(cli.env_file),
        ..ConfigOptions::default()
    });
    config.init().await;
    debug!(app_env = ?config.current_env(), "Configuration ready");

    let output = match cli.command.unwrap_or(Command::List) {
        Command::List => Value::Object(config.list().as_ref().clone()),
        Command::Get { key } => config
            .get_opt(&key)
            .ok_or_else(|| anyhow!("key not found: {key}"))?,
        Command::Env => config.current_env().map(Value::String).unwrap_or(Value::Null),
    };
    println!("{}", render(&output, cli.format.into())?);

    config.stop_watchdogs();
    Ok(())
}
