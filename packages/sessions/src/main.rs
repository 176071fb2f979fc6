#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI for auditing intake conversations and maintaining the session
//! store.
//!
//! ```text
//! detective_sessions list [--limit 20]
//! detective_sessions show <id>
//! detective_sessions export <id>
//! detective_sessions delete <id>
//! detective_sessions purge
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use detective_sessions::history::{
    delete_conversation, format_conversation, get_conversation_messages, list_conversations,
    load_messages, resolve_id, truncate_chars,
};
use detective_sessions::{DEFAULT_DB_PATH, open_db, purge, ttl_from_env};

#[derive(Parser)]
#[command(
    name = "detective_sessions",
    about = "Browse intake conversations and maintain session state"
)]
struct Cli {
    /// Path to the sessions database (defaults to `SESSIONS_DB_PATH`)
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List recent conversations
    List {
        /// Maximum number of conversations to show
        #[arg(long, default_value = "20")]
        limit: u32,
    },
    /// Show a conversation in readable format
    Show {
        /// Conversation ID (UUID or prefix)
        id: String,
    },
    /// Export a conversation as JSON
    Export {
        /// Conversation ID (UUID or prefix)
        id: String,
    },
    /// Delete a conversation
    Delete {
        /// Conversation ID (UUID or prefix)
        id: String,
    },
    /// Remove expired associations and idle conversations
    Purge,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let path = cli.db.unwrap_or_else(|| {
        std::env::var("SESSIONS_DB_PATH")
            .unwrap_or_else(|_| DEFAULT_DB_PATH.to_string())
            .into()
    });
    let db = open_db(&path).await?;

    match cli.command {
        Commands::List { limit } => {
            let conversations = list_conversations(db.as_ref(), limit, 0).await?;

            if conversations.is_empty() {
                println!("No conversations found.");
                return Ok(());
            }

            println!("{:<38} {:<6} {:<22} TITLE", "ID", "MSGS", "UPDATED");
            println!("{}", "-".repeat(100));

            for conv in &conversations {
                let title = conv.title.as_deref().unwrap_or("(no title)");
                let short_date: String = conv.updated_at.chars().take(19).collect();

                println!(
                    "{:<38} {:<6} {:<22} {}",
                    conv.id,
                    conv.message_count,
                    short_date,
                    truncate_chars(title, 50)
                );
            }

            println!("\n{} conversation(s)", conversations.len());
        }
        Commands::Show { id } => {
            let resolved = resolve_id(db.as_ref(), &id).await?;
            let Some(msgs) = get_conversation_messages(db.as_ref(), &resolved).await? else {
                eprintln!("Conversation not found: {id}");
                std::process::exit(1);
            };

            println!("Conversation: {resolved}\n");
            print!("{}", format_conversation(&msgs));
        }
        Commands::Export { id } => {
            let resolved = resolve_id(db.as_ref(), &id).await?;
            let Some(msgs) = load_messages(db.as_ref(), &resolved).await? else {
                eprintln!("Conversation not found: {id}");
                std::process::exit(1);
            };

            println!("{}", serde_json::to_string_pretty(&msgs)?);
        }
        Commands::Delete { id } => {
            let resolved = resolve_id(db.as_ref(), &id).await?;
            if delete_conversation(db.as_ref(), &resolved).await? {
                println!("Deleted conversation: {resolved}");
            } else {
                eprintln!("Conversation not found: {id}");
                std::process::exit(1);
            }
        }
        Commands::Purge => {
            let purged = purge(db.as_ref(), chrono::Utc::now(), ttl_from_env()).await?;
            println!(
                "Purged {} expired value(s) and {} idle conversation(s)",
                purged.values, purged.conversations
            );
        }
    }

    Ok(())
}
