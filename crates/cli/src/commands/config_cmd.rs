//! `confide config` — validate and print the effective configuration.

use clap::Subcommand;
use confide_config::AppConfig;

use super::CliError;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration with secrets redacted
    Show,

    /// Validate the configuration and report readiness
    Check,
}

pub fn run(config: &AppConfig, command: ConfigCommand) -> Result<(), CliError> {
    match command {
        // Debug on AppConfig redacts api_key.
        ConfigCommand::Show => println!("{config:#?}"),
        ConfigCommand::Check => {
            println!("Configuration is valid");
            println!("  bot_name:      {}", config.bot_name);
            println!(
                "  owner_id:      {}",
                if config.owner_id.is_empty() { "(unset)" } else { &config.owner_id }
            );
            println!("  api_key:       {}", if config.models.api_key.is_some() { "set" } else { "missing" });
            println!("  models:        {} / {}", config.models.fast, config.models.capable);
            println!("  embedding:     {}", config.models.embedding);
            println!("  memory path:   {}", config.memory.path.display());
            println!(
                "  web search:    {}",
                if config.web_search.is_some() { "configured" } else { "disabled" }
            );
            println!(
                "  cross-channel: {} by default",
                if config.policy.cross_channel_default { "enabled" } else { "disabled" }
            );
        }
    }
    Ok(())
}
