use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod session;

use commands::{
    ClearCommand, ConfigCommand, DeleteCommand, LogCommand, SearchCommand, ShowCommand,
    SyncCommand, VoiceCommand, WatchCommand,
};
use fooddude::config::Config;

#[derive(Parser)]
#[command(name = "fooddude")]
#[command(version)]
#[command(about = "Log what you eat by typing or saying it", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the food database
    Search(SearchCommand),

    /// Log food from a typed phrase
    Log(LogCommand),

    /// Log food by speaking
    Voice(VoiceCommand),

    /// Show a day's food log
    Show(ShowCommand),

    /// Remove one entry from a meal
    Delete(DeleteCommand),

    /// Remove every entry from a meal
    Clear(ClearCommand),

    /// Send changes that could not be saved earlier
    Sync(SyncCommand),

    /// Follow a day as it changes on the server
    Watch(WatchCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

fn main() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fooddude=warn,fooddude_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Save config path for `config init`
    let cli_config_path = cli.config.clone();

    let config = Config::load(cli.config)?;

    match &cli.command {
        Some(Commands::Search(cmd)) => cmd.run(&config)?,
        Some(Commands::Log(cmd)) => cmd.run(&config)?,
        Some(Commands::Voice(cmd)) => cmd.run(&config)?,
        Some(Commands::Show(cmd)) => cmd.run(&config)?,
        Some(Commands::Delete(cmd)) => cmd.run(&config)?,
        Some(Commands::Clear(cmd)) => cmd.run(&config)?,
        Some(Commands::Sync(cmd)) => cmd.run(&config)?,
        Some(Commands::Watch(cmd)) => cmd.run(&config)?,
        Some(Commands::Config(cmd)) => cmd.run(&config, cli_config_path)?,
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
