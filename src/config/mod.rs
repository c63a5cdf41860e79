use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::paths::Paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Resolved XDG-compliant paths (not serialized)
    #[serde(skip)]
    pub paths: Paths,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Model served by the local inference server
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Sampling temperature passed to the server
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Port a system-wide inference server is expected on
    #[serde(default = "default_system_port")]
    pub system_port: u16,

    /// Private port used when we launch the bundled server ourselves
    #[serde(default = "default_bundled_port")]
    pub bundled_port: u16,

    /// Path to a bundled server binary (optional)
    #[serde(default)]
    pub bundled_binary: Option<String>,

    /// Launch the bundled server when no system server is found
    #[serde(default = "default_true")]
    pub autostart: bool,

    /// Seconds to wait for a launched server to answer
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Embedding provider: "local" (fastembed, default) or "none" (keyword search only)
    #[serde(default = "default_embedding_provider")]
    pub embedding_provider: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// How many memories a recall pulls into the prompt
    #[serde(default = "default_recall_results")]
    pub recall_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Web search results per query
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Character budget for scraped page text
    #[serde(default = "default_scrape_max_chars")]
    pub scrape_max_chars: usize,

    /// HTTP timeout for web tools
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// User-Agent sent by the web tools
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Where exported reports land. Default: data_dir/exports
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_model() -> String {
    "qwen2.5:3b".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_system_port() -> u16 {
    11434
}

fn default_bundled_port() -> u16 {
    11435
}

fn default_true() -> bool {
    true
}

fn default_startup_timeout() -> u64 {
    10
}

fn default_embedding_provider() -> String {
    "local".to_string()
}

fn default_embedding_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_recall_results() -> usize {
    2
}

fn default_max_results() -> usize {
    3
}

fn default_scrape_max_chars() -> usize {
    3000
}

fn default_http_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/91.0.4472.124 Safari/537.36"
        .to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            temperature: default_temperature(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            system_port: default_system_port(),
            bundled_port: default_bundled_port(),
            bundled_binary: None,
            autostart: default_true(),
            startup_timeout_secs: default_startup_timeout(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            embedding_provider: default_embedding_provider(),
            embedding_model: default_embedding_model(),
            recall_results: default_recall_results(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            scrape_max_chars: default_scrape_max_chars(),
            http_timeout_secs: default_http_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Config {
    /// Load configuration from the XDG config file, falling back to defaults.
    pub fn load() -> Result<Self> {
        let paths = Paths::resolve()?;
        Self::load_with_paths(paths)
    }

    /// Load configuration with pre-resolved paths (for testing).
    pub fn load_with_paths(paths: Paths) -> Result<Self> {
        let config_file = paths.config_file();

        let mut config: Config = if config_file.exists() {
            let content = fs::read_to_string(&config_file)
                .with_context(|| format!("Failed to read config: {}", config_file.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config: {}", config_file.display()))?
        } else {
            Config::default()
        };

        config.paths = paths;
        Ok(config)
    }

    /// Path to the config file.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Paths::resolve()?.config_file())
    }

    /// Write the current configuration to disk.
    pub fn save(&self) -> Result<()> {
        let path = self.paths.config_file();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Resolved export directory (config override or data_dir/exports).
    pub fn export_dir(&self) -> PathBuf {
        match &self.export.dir {
            Some(dir) => PathBuf::from(shellexpand::tilde(dir).to_string()),
            None => self.paths.exports_dir(),
        }
    }
}
