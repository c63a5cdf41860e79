pub mod ask;
pub mod chat;
pub mod config;
#[cfg(feature = "desktop")]
pub mod desktop;
pub mod memory;
pub mod models;
pub mod sessions;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::engine::{Engine, OllamaProvider};
use crate::memory::MemoryManager;
use crate::paths::Paths;
use crate::runtime::RuntimeManager;
use crate::storage::ChatStorage;

#[derive(Parser)]
#[command(name = "ferret")]
#[command(author, version, about = "A privacy-first local research assistant")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat session
    Chat(chat::ChatArgs),

    /// Ask a single question
    Ask(ask::AskArgs),

    /// Launch the desktop GUI
    #[cfg(feature = "desktop")]
    Desktop(desktop::DesktopArgs),

    /// Manage saved chat sessions
    Sessions(sessions::SessionsArgs),

    /// Long-term memory operations
    Memory(memory::MemoryArgs),

    /// Manage models on the inference server
    Models(models::ModelsArgs),

    /// Configuration management
    Config(config::ConfigArgs),

    /// Show resolved XDG directory paths
    Paths,
}

/// Bring up the inference runtime and build an engine around it.
///
/// The returned RuntimeManager must be kept alive: dropping it tears down a
/// bundled server we launched.
pub(crate) async fn build_engine(
    config: &Config,
    model_override: Option<String>,
) -> Result<(Engine, RuntimeManager)> {
    config.paths.ensure_dirs()?;

    let mut runtime = RuntimeManager::new(&config.runtime, config.paths.models_dir());
    runtime.initialize().await?;

    let model = model_override.unwrap_or_else(|| config.engine.default_model.clone());
    let provider = OllamaProvider::new(runtime.endpoint(), &model, config.engine.temperature);

    let storage = ChatStorage::open(&config.paths.history_db())?;
    let cache_dir = config.paths.embedding_cache_dir();
    let memory = MemoryManager::new(
        &config.paths.memory_db(),
        &config.memory,
        cache_dir.to_str(),
    )?;

    let engine = Engine::new(config, Box::new(provider), storage, memory)?;
    Ok((engine, runtime))
}

pub fn show_paths() -> Result<()> {
    let paths = Paths::resolve()?;
    println!("config dir: {}", paths.config_dir.display());
    println!("data dir:   {}", paths.data_dir.display());
    println!("state dir:  {}", paths.state_dir.display());
    println!("cache dir:  {}", paths.cache_dir.display());
    println!();
    println!("config file: {}", paths.config_file().display());
    println!("history db:  {}", paths.history_db().display());
    println!("memory db:   {}", paths.memory_db().display());
    println!("models dir:  {}", paths.models_dir().display());
    println!("exports dir: {}", paths.exports_dir().display());
    Ok(())
}
