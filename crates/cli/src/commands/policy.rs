//! `confide policy` — per-server disclosure policy toggles.

use clap::Subcommand;
use confide_config::AppConfig;

use super::{CliError, connect_llm, open_store, open_store_offline};

#[derive(Subcommand)]
pub enum PolicyCommand {
    /// Show the effective cross-channel setting for a server
    Show { guild_id: String },

    /// Allow referencing content across channels of a server
    CrossChannelOn { guild_id: String },

    /// Restrict retrieval to the current channel (the default)
    CrossChannelOff { guild_id: String },
}

pub async fn run(config: &AppConfig, command: PolicyCommand) -> Result<(), CliError> {
    match command {
        PolicyCommand::Show { guild_id } => {
            let store = open_store_offline(config);
            match store.get_cross_channel(&guild_id).await {
                Some(enabled) => {
                    println!(
                        "Cross-channel sharing for {guild_id}: {}",
                        if enabled { "enabled" } else { "disabled" }
                    );
                }
                None => {
                    println!(
                        "Cross-channel sharing for {guild_id}: {} (default)",
                        if config.policy.cross_channel_default { "enabled" } else { "disabled" }
                    );
                }
            }
        }
        PolicyCommand::CrossChannelOn { guild_id } => {
            let store = open_store(config, connect_llm(config)?);
            store.set_cross_channel(&guild_id, true).await?;
            println!("Cross-channel sharing enabled for {guild_id}");
        }
        PolicyCommand::CrossChannelOff { guild_id } => {
            let store = open_store(config, connect_llm(config)?);
            store.set_cross_channel(&guild_id, false).await?;
            println!("Cross-channel sharing disabled for {guild_id}");
        }
    }
    Ok(())
}
