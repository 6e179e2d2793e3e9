//! `confide consent` — inspect recorded consent decisions.

use clap::Subcommand;
use confide_config::AppConfig;
use serde_json::Value;

use super::{CliError, open_store_offline};

#[derive(Subcommand)]
pub enum ConsentCommand {
    /// List a user's recorded decisions, newest last
    List {
        /// The subject whose decisions to show
        #[arg(long)]
        user: String,

        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: usize,

        #[arg(long, default_value_t = 10)]
        page_size: usize,
    },
}

pub async fn run(config: &AppConfig, command: ConsentCommand) -> Result<(), CliError> {
    let store = open_store_offline(config);
    match command {
        ConsentCommand::List { user, page, page_size } => {
            let decisions = store.list_consents_for_user(&user, page, page_size).await;
            println!(
                "{} decision(s) recorded for {user} (page {page})",
                decisions.total
            );
            for record in decisions.items {
                let granted = record
                    .metadata
                    .get("granted")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let scope = record
                    .metadata
                    .get("scope")
                    .and_then(Value::as_str)
                    .unwrap_or("?");
                let target = record
                    .metadata
                    .get("target")
                    .and_then(Value::as_str)
                    .unwrap_or("?");
                let decided_at = record
                    .metadata
                    .get("decided_at")
                    .and_then(Value::as_str)
                    .unwrap_or("?");
                println!(
                    "  {} scope={scope} target={target} at={decided_at}",
                    if granted { "allow" } else { "deny " }
                );
            }
        }
    }
    Ok(())
}
