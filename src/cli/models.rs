use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::Config;
use crate::runtime::RuntimeManager;

#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommands,
}

#[derive(Subcommand)]
pub enum ModelsCommands {
    /// List models installed on the inference server
    List,

    /// Download a model (e.g., llama3.2, mistral)
    Pull {
        /// Model name
        name: String,
    },
}

pub async fn run(args: ModelsArgs) -> Result<()> {
    let config = Config::load()?;
    config.paths.ensure_dirs()?;

    let mut runtime = RuntimeManager::new(&config.runtime, config.paths.models_dir());
    runtime.initialize().await?;

    match args.command {
        ModelsCommands::List => {
            let models = runtime.list_models().await?;
            if models.is_empty() {
                println!("No models installed. Pull one with: ferret models pull <name>");
            } else {
                for model in models {
                    let marker = if model == config.engine.default_model {
                        "*"
                    } else {
                        " "
                    };
                    println!("{} {}", marker, model);
                }
            }
        }
        ModelsCommands::Pull { name } => {
            let mut last_status = String::new();
            runtime
                .pull_model(&name, |status| {
                    // The server repeats the same status for every chunk
                    if status != last_status {
                        println!("{}", status);
                        last_status = status.to_string();
                    }
                })
                .await?;
            println!("Successfully downloaded '{}'", name);
        }
    }

    Ok(())
}
