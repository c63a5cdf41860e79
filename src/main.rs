use anyhow::Result;
use clap::Parser;

use ferret::cli::{self, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    match cli.command {
        Commands::Chat(args) => cli::chat::run(args).await,
        Commands::Ask(args) => cli::ask::run(args).await,
        #[cfg(feature = "desktop")]
        Commands::Desktop(args) => cli::desktop::run(args),
        Commands::Sessions(args) => cli::sessions::run(args).await,
        Commands::Memory(args) => cli::memory::run(args).await,
        Commands::Models(args) => cli::models::run(args).await,
        Commands::Config(args) => cli::config::run(args).await,
        Commands::Paths => cli::show_paths(),
    }
}
