//! `confide memory` — store statistics and purging.

use clap::Subcommand;
use confide_config::AppConfig;
use confide_memory::MetaFilter;
use serde_json::json;

use super::{CliError, open_store_offline};

#[derive(Subcommand)]
pub enum MemoryCommand {
    /// Record counts per collection
    Stats,

    /// Delete stored messages matching the given scope
    Purge {
        /// Limit to one server
        #[arg(long)]
        guild: Option<String>,

        /// Limit to one channel
        #[arg(long)]
        channel: Option<String>,

        /// Limit to one user's messages
        #[arg(long)]
        user: Option<String>,
    },
}

pub async fn run(config: &AppConfig, command: MemoryCommand) -> Result<(), CliError> {
    let store = open_store_offline(config);
    match command {
        MemoryCommand::Stats => {
            println!("Store: {}", config.memory.path.display());
            for (collection, count) in store.counts().await {
                println!("  {collection:<14} {count}");
            }
        }
        MemoryCommand::Purge { guild, channel, user } => {
            let mut filter = MetaFilter::new();
            if let Some(guild) = guild {
                filter.insert("guild_id".into(), json!(guild));
            }
            if let Some(channel) = channel {
                filter.insert("channel_id".into(), json!(channel));
            }
            if let Some(user) = user {
                filter.insert("user_id".into(), json!(user));
            }
            if filter.is_empty() {
                return Err("refusing to purge everything; pass --guild, --channel, or --user".into());
            }
            let removed = store.delete_messages(&filter).await;
            println!("Deleted {removed} message(s)");
        }
    }
    Ok(())
}
