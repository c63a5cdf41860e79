use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::Config;
use crate::storage::ChatStorage;
use crate::tools::export_report;

#[derive(Args)]
pub struct SessionsArgs {
    #[command(subcommand)]
    pub command: SessionsCommands,
}

#[derive(Subcommand)]
pub enum SessionsCommands {
    /// List saved sessions
    List,

    /// Print a session transcript
    Show {
        /// Session ID (or unique prefix)
        id: String,
    },

    /// Delete a session and its messages
    Delete {
        /// Session ID (or unique prefix)
        id: String,
    },

    /// Export a session transcript as markdown
    Export {
        /// Session ID (or unique prefix)
        id: String,
    },
}

pub async fn run(args: SessionsArgs) -> Result<()> {
    let config = Config::load()?;
    config.paths.ensure_dirs()?;
    let storage = ChatStorage::open(&config.paths.history_db())?;

    match args.command {
        SessionsCommands::List => {
            let sessions = storage.list_sessions()?;
            if sessions.is_empty() {
                println!("No saved sessions.");
            } else {
                for session in sessions {
                    println!(
                        "{}  {}  {}",
                        &session.id[..8],
                        session.created_at,
                        session.title
                    );
                }
            }
        }
        SessionsCommands::Show { id } => {
            let id = resolve(&storage, &id)?;
            for msg in storage.session_messages(&id)? {
                println!("{}: {}\n", msg.role, msg.content);
            }
        }
        SessionsCommands::Delete { id } => {
            let id = resolve(&storage, &id)?;
            storage.delete_session(&id)?;
            println!("Deleted session {}", &id[..8]);
        }
        SessionsCommands::Export { id } => {
            let id = resolve(&storage, &id)?;
            let title = storage
                .session_title(&id)?
                .unwrap_or_else(|| "session".to_string());

            let mut transcript = format!("# {}\n\n", title);
            for msg in storage.session_messages(&id)? {
                transcript.push_str(&format!("**{}**\n\n{}\n\n---\n\n", msg.role, msg.content));
            }

            let message = export_report(&config.export_dir(), &title, &transcript)?;
            println!("{}", message);
        }
    }

    Ok(())
}

fn resolve(storage: &ChatStorage, prefix: &str) -> Result<String> {
    let sessions = storage.list_sessions()?;
    let matches: Vec<_> = sessions
        .iter()
        .filter(|s| s.id.starts_with(prefix))
        .collect();

    match matches.len() {
        0 => anyhow::bail!("No session matches '{}'", prefix),
        1 => Ok(matches[0].id.clone()),
        n => anyhow::bail!("'{}' is ambiguous ({} sessions match)", prefix, n),
    }
}
