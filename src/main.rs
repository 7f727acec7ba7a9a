use anyhow::Result;
use bitquote::core::log::init_logging;
use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// List the unique codes found in the table
    Codes,
    /// Fetch and display the latest price of every code
    Prices,
    /// Fetch prices and write them back to the table
    Update,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config_path = cli.config_path.as_deref();
    let result = match cli.command {
        Some(Commands::Setup) => match config_path {
            Some(path) => bitquote::cli::setup::setup_at_path(path),
            None => bitquote::cli::setup::setup(),
        },
        Some(Commands::Codes) => {
            bitquote::run_command(bitquote::AppCommand::Codes, config_path).await
        }
        Some(Commands::Prices) => {
            bitquote::run_command(bitquote::AppCommand::Prices, config_path).await
        }
        Some(Commands::Update) => {
            bitquote::run_command(bitquote::AppCommand::Update, config_path).await
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
