use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::Config;
use crate::memory::MemoryManager;

#[derive(Args)]
pub struct MemoryArgs {
    #[command(subcommand)]
    pub command: MemoryCommands,
}

#[derive(Subcommand)]
pub enum MemoryCommands {
    /// Show memory statistics
    Stats,

    /// Search stored memories
    Search {
        /// The search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Delete all stored memories
    Wipe {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn run(args: MemoryArgs) -> Result<()> {
    let config = Config::load()?;
    config.paths.ensure_dirs()?;

    let cache_dir = config.paths.embedding_cache_dir();
    let memory = MemoryManager::new(
        &config.paths.memory_db(),
        &config.memory,
        cache_dir.to_str(),
    )?;

    match args.command {
        MemoryCommands::Stats => {
            println!("Database:   {}", config.paths.memory_db().display());
            println!("Entries:    {}", memory.count());
            println!(
                "Embeddings: {}",
                if memory.has_embeddings() {
                    config.memory.embedding_model.as_str()
                } else {
                    "disabled (keyword search only)"
                }
            );
        }
        MemoryCommands::Search { query, limit } => {
            let context = memory.recall(&query, limit).await;
            if context.is_empty() {
                println!("No memories found.");
            } else {
                print!("{}", context);
            }
        }
        MemoryCommands::Wipe { force } => {
            if !force {
                print!("Delete all {} stored memories? [y/N] ", memory.count());
                use std::io::Write;
                std::io::stdout().flush()?;

                let mut answer = String::new();
                std::io::stdin().read_line(&mut answer)?;
                if !answer.trim().eq_ignore_ascii_case("y") {
                    println!("Aborted.");
                    return Ok(());
                }
            }

            memory.wipe()?;
            println!("Memory completely wiped.");
        }
    }

    Ok(())
}
