//! XDG Base Directory Specification compliant path resolution.
//!
//! Every directory is resolved through a three-level fallback:
//! 1. Ferret-specific env var (FERRET_CONFIG_DIR, etc.)
//! 2. XDG env var (XDG_CONFIG_HOME, etc.) via `etcetera`
//! 3. Platform default (~/.config, etc.)
//!
//! All paths are absolute. Relative paths from env vars are ignored per XDG spec.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Resolved directory paths for the entire application.
///
/// Created once at startup, threaded through Config.
/// All paths are absolute.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Config directory: config.toml lives here
    pub config_dir: PathBuf,

    /// Data directory root: chat history, vector memory, pulled models, exports
    pub data_dir: PathBuf,

    /// State directory: logs
    pub state_dir: PathBuf,

    /// Cache directory: embedding model downloads
    pub cache_dir: PathBuf,
}

impl Paths {
    /// Resolve all paths using real environment variables.
    pub fn resolve() -> Result<Self> {
        Self::resolve_with_env(|key| std::env::var(key))
    }

    /// Resolve paths with a custom env var lookup (for testing).
    pub fn resolve_with_env<F>(env_fn: F) -> Result<Self>
    where
        F: Fn(&str) -> std::result::Result<String, std::env::VarError>,
    {
        use etcetera::BaseStrategy;

        let strategy = etcetera::choose_base_strategy()
            .map_err(|e| anyhow::anyhow!("Failed to determine base directories: {}", e))?;

        let config_dir = env_or(&env_fn, "FERRET_CONFIG_DIR", || {
            strategy.config_dir().join("ferret")
        });

        let data_dir = env_or(&env_fn, "FERRET_DATA_DIR", || {
            strategy.data_dir().join("ferret")
        });

        let state_dir = env_or(&env_fn, "FERRET_STATE_DIR", || {
            // state_dir() returns None on platforms without XDG_STATE_HOME.
            let base_state = strategy.state_dir().unwrap_or_else(|| strategy.data_dir());
            base_state.join("ferret")
        });

        let cache_dir = env_or(&env_fn, "FERRET_CACHE_DIR", || {
            strategy.cache_dir().join("ferret")
        });

        Ok(Self {
            config_dir,
            data_dir,
            state_dir,
            cache_dir,
        })
    }

    // ── Convenience accessors for specific files ──

    /// Config file: config_dir/config.toml
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Chat history database: data_dir/history.sqlite
    pub fn history_db(&self) -> PathBuf {
        self.data_dir.join("history.sqlite")
    }

    /// Vector memory database: data_dir/memory.sqlite
    pub fn memory_db(&self) -> PathBuf {
        self.data_dir.join("memory.sqlite")
    }

    /// Model storage for the bundled inference server: data_dir/models
    pub fn models_dir(&self) -> PathBuf {
        self.data_dir.join("models")
    }

    /// Default directory for exported research reports: data_dir/exports
    pub fn exports_dir(&self) -> PathBuf {
        self.data_dir.join("exports")
    }

    /// Embedding model cache: cache_dir/embeddings
    pub fn embedding_cache_dir(&self) -> PathBuf {
        self.cache_dir.join("embeddings")
    }

    /// Create all directories with appropriate permissions.
    pub fn ensure_dirs(&self) -> Result<()> {
        let dirs = [
            &self.config_dir,
            &self.data_dir,
            &self.state_dir,
            &self.cache_dir,
        ];

        for dir in &dirs {
            create_dir_with_mode(dir)?;
        }

        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::resolve().unwrap_or_else(|_| {
            // Emergency fallback — should never happen in practice
            let home = etcetera::home_dir().unwrap_or_else(|_| PathBuf::from("."));
            Self {
                config_dir: home.join(".config").join("ferret"),
                data_dir: home.join(".local").join("share").join("ferret"),
                state_dir: home.join(".local").join("state").join("ferret"),
                cache_dir: home.join(".cache").join("ferret"),
            }
        })
    }
}

/// Resolve an env var with fallback. Ignores empty and relative paths per XDG spec.
fn env_or<F>(env_fn: &F, var: &str, default: impl FnOnce() -> PathBuf) -> PathBuf
where
    F: Fn(&str) -> std::result::Result<String, std::env::VarError>,
{
    env_fn(var)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .filter(|p| p.is_absolute()) // XDG spec: ignore relative paths
        .unwrap_or_else(default)
}

/// Create a directory with mode 0700 per XDG spec.
fn create_dir_with_mode(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Helper: build an env_fn from a HashMap
    fn make_env(
        map: HashMap<&str, &str>,
    ) -> impl Fn(&str) -> std::result::Result<String, std::env::VarError> {
        move |key: &str| {
            map.get(key)
                .map(|v| v.to_string())
                .ok_or(std::env::VarError::NotPresent)
        }
    }

    #[test]
    fn default_paths_are_xdg_compliant() {
        let env: HashMap<&str, &str> = HashMap::new();
        let paths = Paths::resolve_with_env(make_env(env)).unwrap();

        assert!(
            paths.config_dir.ends_with("ferret"),
            "config_dir: {:?}",
            paths.config_dir
        );
        assert!(
            paths.data_dir.ends_with("ferret"),
            "data_dir: {:?}",
            paths.data_dir
        );
        assert!(
            paths.state_dir.ends_with("ferret"),
            "state_dir: {:?}",
            paths.state_dir
        );
        assert!(
            paths.cache_dir.ends_with("ferret"),
            "cache_dir: {:?}",
            paths.cache_dir
        );
    }

    #[test]
    fn ferret_env_vars_override_xdg() {
        let mut env: HashMap<&str, &str> = HashMap::new();
        env.insert("FERRET_CONFIG_DIR", "/custom/config");
        env.insert("FERRET_DATA_DIR", "/custom/data");
        env.insert("FERRET_STATE_DIR", "/custom/state");
        env.insert("FERRET_CACHE_DIR", "/custom/cache");

        let paths = Paths::resolve_with_env(make_env(env)).unwrap();
        assert_eq!(paths.config_dir, PathBuf::from("/custom/config"));
        assert_eq!(paths.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(paths.state_dir, PathBuf::from("/custom/state"));
        assert_eq!(paths.cache_dir, PathBuf::from("/custom/cache"));
    }

    #[test]
    fn relative_paths_are_ignored() {
        let mut env: HashMap<&str, &str> = HashMap::new();
        env.insert("FERRET_CONFIG_DIR", "relative/path");

        let paths = Paths::resolve_with_env(make_env(env)).unwrap();
        // Should fall back to XDG default, not use relative path
        assert!(paths.config_dir.is_absolute());
        assert_ne!(paths.config_dir, PathBuf::from("relative/path"));
    }

    #[test]
    fn empty_env_vars_ignored() {
        let mut env: HashMap<&str, &str> = HashMap::new();
        env.insert("FERRET_DATA_DIR", "");

        let paths = Paths::resolve_with_env(make_env(env)).unwrap();
        assert!(paths.data_dir.is_absolute());
        assert!(paths.data_dir.ends_with("ferret"));
    }

    #[test]
    fn convenience_accessors() {
        let env: HashMap<&str, &str> = HashMap::new();
        let paths = Paths::resolve_with_env(make_env(env)).unwrap();

        assert!(paths.config_file().ends_with("config.toml"));
        assert!(paths.history_db().ends_with("history.sqlite"));
        assert!(paths.memory_db().ends_with("memory.sqlite"));
        assert!(paths.models_dir().ends_with("models"));
        assert!(paths.exports_dir().ends_with("exports"));
        assert!(paths.embedding_cache_dir().ends_with("embeddings"));
    }
}
