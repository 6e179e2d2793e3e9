//! `confide persona` — show or set the three persona layers.

use clap::Subcommand;
use confide_config::AppConfig;

use super::{CliError, connect_llm, open_store, open_store_offline};

#[derive(Subcommand)]
pub enum PersonaCommand {
    /// Print the stored persona layers
    Show {
        /// User whose layer to include
        #[arg(long)]
        user: Option<String>,

        /// Server whose layer to include
        #[arg(long)]
        guild: Option<String>,
    },

    /// Replace the core persona text
    SetCore { text: String },

    /// Replace a user's persona layer
    SetUser { user_id: String, text: String },

    /// Replace a server's persona layer
    SetServer { guild_id: String, text: String },
}

pub async fn run(config: &AppConfig, command: PersonaCommand) -> Result<(), CliError> {
    match command {
        PersonaCommand::Show { user, guild } => {
            let store = open_store_offline(config);
            let core = store.get_persona_core().await;
            println!("core:");
            println!("{}", if core.is_empty() { "  (unset)" } else { &core });
            if let Some(user) = user {
                let text = store.get_persona_user(&user).await;
                println!("user {user}:");
                println!("{}", if text.is_empty() { "  (unset)" } else { &text });
            }
            if let Some(guild) = guild {
                let text = store.get_persona_server(&guild).await;
                println!("server {guild}:");
                println!("{}", if text.is_empty() { "  (unset)" } else { &text });
            }
        }
        PersonaCommand::SetCore { text } => {
            let store = open_store(config, connect_llm(config)?);
            store.set_persona_core(&text).await?;
            println!("Core persona updated ({} chars)", text.len());
        }
        PersonaCommand::SetUser { user_id, text } => {
            let store = open_store(config, connect_llm(config)?);
            store.set_persona_user(&user_id, &text).await?;
            println!("Persona for user {user_id} updated ({} chars)", text.len());
        }
        PersonaCommand::SetServer { guild_id, text } => {
            let store = open_store(config, connect_llm(config)?);
            store.set_persona_server(&guild_id, &text).await?;
            println!("Persona for server {guild_id} updated ({} chars)", text.len());
        }
    }
    Ok(())
}
