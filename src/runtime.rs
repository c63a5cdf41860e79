//! Runtime bootstrapper for the local inference server.
//!
//! Prefers a system-wide Ollama-compatible server already listening on its
//! default port. When none is found and a bundled binary is configured, a
//! private instance is launched on its own port with models kept under the
//! app's data directory. Model listing and pulling go through the server's
//! HTTP API.

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::Client;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;

const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

pub struct RuntimeManager {
    config: RuntimeConfig,
    models_dir: PathBuf,
    client: Client,
    endpoint: String,
    process: Option<Child>,
}

impl RuntimeManager {
    pub fn new(config: &RuntimeConfig, models_dir: PathBuf) -> Self {
        Self {
            config: config.clone(),
            models_dir,
            client: Client::new(),
            endpoint: endpoint_for(config.system_port),
            process: None,
        }
    }

    /// Resolved base URL of the inference server.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// True when we launched the server ourselves.
    pub fn using_bundled(&self) -> bool {
        self.process.is_some()
    }

    /// Decide whether to use the system server or launch the bundled one.
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing inference runtime...");

        // 1. A system server already listening wins
        if port_open(self.config.system_port).await {
            info!(
                "Detected system inference server on port {}",
                self.config.system_port
            );
            self.endpoint = endpoint_for(self.config.system_port);
            return Ok(());
        }

        // 2. Fall back to the bundled binary, if configured
        if self.config.autostart
            && let Some(binary) = self.bundled_binary_path()
        {
            if binary.exists() {
                info!("System server not found, starting bundled server...");
                self.endpoint = endpoint_for(self.config.bundled_port);
                self.spawn_bundled(&binary)?;
                self.wait_for_ready().await?;
                return Ok(());
            }
            warn!("Bundled binary not found: {}", binary.display());
        }

        anyhow::bail!(
            "No inference server found on port {} and no bundled binary available. \
             Install Ollama (https://ollama.com) or set runtime.bundled_binary in the config.",
            self.config.system_port
        )
    }

    fn bundled_binary_path(&self) -> Option<PathBuf> {
        self.config
            .bundled_binary
            .as_ref()
            .map(|p| PathBuf::from(shellexpand::tilde(p).to_string()))
    }

    fn spawn_bundled(&mut self, binary: &Path) -> Result<()> {
        std::fs::create_dir_all(&self.models_dir)?;

        let child = tokio::process::Command::new(binary)
            .arg("serve")
            .env(
                "OLLAMA_HOST",
                format!("127.0.0.1:{}", self.config.bundled_port),
            )
            .env("OLLAMA_MODELS", &self.models_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to launch {}", binary.display()))?;

        debug!(
            "Bundled server starting on port {} (pid: {:?})",
            self.config.bundled_port,
            child.id()
        );
        self.process = Some(child);
        Ok(())
    }

    /// Ping the server until it responds or the startup timeout elapses.
    async fn wait_for_ready(&self) -> Result<()> {
        for _ in 0..self.config.startup_timeout_secs {
            if self.client.get(&self.endpoint).send().await.is_ok() {
                info!("Inference server is ready");
                return Ok(());
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        anyhow::bail!(
            "Inference server did not answer within {}s",
            self.config.startup_timeout_secs
        )
    }

    /// Installed models, via `GET /api/tags`.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response: Value = self
            .client
            .get(format!("{}/api/tags", self.endpoint))
            .send()
            .await?
            .json()
            .await?;

        Ok(parse_model_names(&response))
    }

    /// Download a model via `POST /api/pull`, reporting streamed status lines.
    pub async fn pull_model(
        &self,
        name: &str,
        mut progress: impl FnMut(&str),
    ) -> Result<()> {
        info!("Pulling model: {}", name);

        let response = self
            .client
            .post(format!("{}/api/pull", self.endpoint))
            .json(&json!({ "name": name }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Model pull failed ({}): {}", status, body);
        }

        let mut byte_stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = byte_stream.next().await {
            buffer.push_str(&String::from_utf8_lossy(&chunk?));

            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].to_string();
                buffer = buffer[pos + 1..].to_string();

                if line.is_empty() {
                    continue;
                }

                if let Some(error) = parse_pull_error(&line) {
                    anyhow::bail!("Model pull failed: {}", error);
                }
                if let Some(status) = parse_pull_status(&line) {
                    progress(&status);
                }
            }
        }

        info!("Model pulled: {}", name);
        Ok(())
    }

    /// Terminate the server, but only if we started it.
    pub fn shutdown(&mut self) {
        if let Some(mut child) = self.process.take() {
            info!("Shutting down bundled inference server");
            if let Err(e) = child.start_kill() {
                warn!("Failed to stop bundled server: {}", e);
            }
        }
    }
}

impl Drop for RuntimeManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn endpoint_for(port: u16) -> String {
    format!("http://127.0.0.1:{}", port)
}

/// Check whether something is already listening on a local port.
async fn port_open(port: u16) -> bool {
    matches!(
        tokio::time::timeout(
            PROBE_TIMEOUT,
            tokio::net::TcpStream::connect(("127.0.0.1", port)),
        )
        .await,
        Ok(Ok(_))
    )
}

fn parse_model_names(response: &Value) -> Vec<String> {
    response["models"]
        .as_array()
        .map(|models| {
            models
                .iter()
                .filter_map(|m| m["name"].as_str())
                .map(|name| name.to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_pull_status(line: &str) -> Option<String> {
    let json: Value = serde_json::from_str(line).ok()?;
    json["status"].as_str().map(|s| s.to_string())
}

fn parse_pull_error(line: &str) -> Option<String> {
    let json: Value = serde_json::from_str(line).ok()?;
    json["error"].as_str().map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_formatting() {
        assert_eq!(endpoint_for(11434), "http://127.0.0.1:11434");
    }

    #[test]
    fn parse_model_names_from_tags_response() {
        let response: Value = serde_json::from_str(
            r#"{"models":[{"name":"qwen2.5:3b","size":1},{"name":"llama3.2:latest","size":2}]}"#,
        )
        .unwrap();

        assert_eq!(
            parse_model_names(&response),
            vec!["qwen2.5:3b".to_string(), "llama3.2:latest".to_string()]
        );

        let empty: Value = serde_json::from_str(r#"{"models":[]}"#).unwrap();
        assert!(parse_model_names(&empty).is_empty());

        let malformed: Value = serde_json::from_str(r#"{"error":"nope"}"#).unwrap();
        assert!(parse_model_names(&malformed).is_empty());
    }

    #[test]
    fn parse_pull_lines() {
        assert_eq!(
            parse_pull_status(r#"{"status":"pulling manifest"}"#).as_deref(),
            Some("pulling manifest")
        );
        assert!(parse_pull_status("not json").is_none());
        assert_eq!(
            parse_pull_error(r#"{"error":"model not found"}"#).as_deref(),
            Some("model not found")
        );
        assert!(parse_pull_error(r#"{"status":"ok"}"#).is_none());
    }

    #[tokio::test]
    async fn port_probe_detects_listener() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(port_open(port).await);
        drop(listener);
        assert!(!port_open(port).await);
    }

    #[tokio::test]
    async fn initialize_fails_without_server_or_binary() {
        // Pick a port nothing listens on by binding and dropping it
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = RuntimeConfig {
            system_port: port,
            bundled_binary: None,
            ..Default::default()
        };

        let mut runtime = RuntimeManager::new(&config, std::env::temp_dir().join("ferret-test"));
        let err = runtime.initialize().await.unwrap_err();
        assert!(err.to_string().contains("No inference server found"));
    }
}
