use std::path::PathBuf;

use clap::{Parser, Subcommand};

use easypaste::commands;
use easypaste::config::Config;
use easypaste::App;

#[derive(Parser)]
#[command(name = "easypaste", version, about = "Share text and code for a day")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve,
    /// Delete every expired paste from the database, then exit.
    PurgeExpired,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    let app = App::connect(config).await?;

    match cli.command {
        Command::Serve => commands::serve::run(app).await,
        Command::PurgeExpired => commands::purge_expired::run(app).await,
    }
}
