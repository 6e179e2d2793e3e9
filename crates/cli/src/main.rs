//! Confide CLI — the main entry point.
//!
//! Commands:
//! - `ask`      — Run one question through the full turn pipeline
//! - `persona`  — Show or set the persona layers
//! - `policy`   — Server policy toggles
//! - `memory`   — Store statistics and purging
//! - `consent`  — Inspect recorded consent decisions
//! - `config`   — Validate and print the effective configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "confide",
    about = "Confide — a privacy-aware conversational assistant",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a config file (defaults to environment-only configuration)
    #[arg(short, long, global = true, env = "CONFIDE_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question through the full pipeline
    Ask {
        /// The question to ask
        question: String,

        /// The user the question is about, when not the asker
        #[arg(long)]
        subject: Option<String>,
    },

    /// Show or set persona layers
    Persona {
        #[command(subcommand)]
        command: commands::persona::PersonaCommand,
    },

    /// Server policy toggles
    Policy {
        #[command(subcommand)]
        command: commands::policy::PolicyCommand,
    },

    /// Memory statistics and purging
    Memory {
        #[command(subcommand)]
        command: commands::memory::MemoryCommand,
    },

    /// Inspect recorded consent decisions
    Consent {
        #[command(subcommand)]
        command: commands::consent::ConsentCommand,
    },

    /// Validate and print the effective configuration
    Config {
        #[command(subcommand)]
        command: commands::config_cmd::ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ask { question, subject } => commands::ask::run(&config, question, subject).await?,
        Commands::Persona { command } => commands::persona::run(&config, command).await?,
        Commands::Policy { command } => commands::policy::run(&config, command).await?,
        Commands::Memory { command } => commands::memory::run(&config, command).await?,
        Commands::Consent { command } => commands::consent::run(&config, command).await?,
        Commands::Config { command } => commands::config_cmd::run(&config, command)?,
    }

    Ok(())
}
