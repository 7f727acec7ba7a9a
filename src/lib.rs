pub mod cli;
pub mod core;
pub mod providers;

use crate::core::config::AppConfig;
use crate::providers::bitable::BitableClient;
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{debug, info};

pub enum AppCommand {
    Codes,
    Prices,
    Update,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("bitquote starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!(
        table = %config.bitable.table_id,
        columns = ?config.table,
        "Loaded config"
    );

    let timeout = Duration::from_secs(config.timeout_secs);
    let store = BitableClient::connect(&config.bitable, timeout)
        .await
        .context("Failed to connect to Bitable")?;

    match command {
        AppCommand::Codes => cli::codes::run(&store, &config.table).await,
        AppCommand::Prices => {
            let resolver = providers::build_resolver(&config)?;
            cli::prices::run(&store, &resolver, &config.table).await
        }
        AppCommand::Update => {
            let resolver = providers::build_resolver(&config)?;
            cli::update::run(&store, &resolver, &config.table).await
        }
    }
}
