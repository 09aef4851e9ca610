//! Taskgate CLI - Command-line interface for the Taskgate task API.
//!
//! Provides account, task, user administration, health, and configuration commands.

mod client;
mod commands;
mod output;
mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{auth, config, health, task, user};
use output::OutputFormat;
use session::SessionStore;

/// Taskgate - task API client
#[derive(Parser)]
#[command(
    name = "taskgate",
    version = "0.1.0",
    about = "Taskgate - task API client",
    long_about = "CLI tool for logging in to a Taskgate server and managing tasks, users and roles.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// API server URL
    #[arg(long, global = true, env = "TASKGATE_API_URL")]
    api_url: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register, log in and out
    #[command(subcommand)]
    Auth(auth::AuthCommands),

    /// Task management operations
    #[command(subcommand)]
    Task(task::TaskCommands),

    /// User and role administration
    #[command(subcommand)]
    User(user::UserCommands),

    /// Check system health
    Health(health::HealthArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

async fn run(cli: Cli) -> Result<()> {
    let settings = config::load_config()?;

    let api_url = cli
        .api_url
        .or(settings.api_url)
        .unwrap_or_else(|| "http://localhost:8080".to_string());
    let sessions = match settings.session_file {
        Some(path) => SessionStore::new(path),
        None => SessionStore::default_location()?,
    };

    let client = client::ApiClient::new(&api_url)?.with_session_store(sessions)?;
    let format = cli.output;

    match cli.command {
        Commands::Auth(cmd) => auth::execute(cmd, &client, format).await,
        Commands::Task(cmd) => task::execute(cmd, &client, format).await,
        Commands::User(cmd) => user::execute(cmd, &client, format).await,
        Commands::Health(args) => health::execute(args, &client, format).await,
        Commands::Config(cmd) => config::execute(cmd, format).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
