use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::Config;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show {
        /// Output format: toml (default) or json
        #[arg(short, long, default_value = "toml")]
        format: String,
    },

    /// Show config file path
    Path,

    /// Initialize default config file
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn run(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show { format } => show_config(&format),
        ConfigCommands::Path => show_path(),
        ConfigCommands::Init { force } => init_config(force),
    }
}

fn show_config(format: &str) -> Result<()> {
    let config = Config::load()?;

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        _ => {
            let toml = toml::to_string_pretty(&config)?;
            println!("{}", toml);
        }
    }

    Ok(())
}

fn show_path() -> Result<()> {
    let path = Config::config_path()?;
    println!("{}", path.display());
    Ok(())
}

fn init_config(force: bool) -> Result<()> {
    let path = Config::config_path()?;

    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;

    println!("Created config file at {}", path.display());
    Ok(())
}

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Ferret Configuration

[engine]
# Model served by the local inference server
default_model = "qwen2.5:3b"
temperature = 0.7

[runtime]
# Port of a system-wide Ollama-compatible server
system_port = 11434
# Private port used when Ferret launches the bundled server itself
bundled_port = 11435
# Path to a bundled server binary (optional)
# bundled_binary = "~/.local/share/ferret/bin/ollama"
autostart = true

[memory]
# "local" (fastembed, default) or "none" (keyword search only)
embedding_provider = "local"
embedding_model = "all-MiniLM-L6-v2"
# How many memories a recall pulls into the prompt
recall_results = 2

[search]
# Web search results per query
max_results = 3
# Character budget for scraped page text
scrape_max_chars = 3000
http_timeout_secs = 10

[export]
# Where exported reports land. Default: XDG data dir under exports/
# dir = "~/Documents/ferret-reports"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_as_valid_config() {
        let config: Config = toml::from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.engine.default_model, "qwen2.5:3b");
        assert_eq!(config.runtime.bundled_port, 11435);
        assert_eq!(config.memory.embedding_provider, "local");
    }
}
