//! LLM provider abstraction over the local inference server.
//!
//! The only backend is an Ollama-compatible HTTP API, but the trait keeps the
//! engine testable and leaves room for other local runtimes.

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::pin::Pin;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StreamChunk {
    pub delta: String,
    pub done: bool,
}

pub type StreamResult = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Full chat completion over a message history.
    async fn chat(&self, messages: &[Message]) -> Result<String>;

    /// One-off completion for router/planner prompts.
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.chat(&[Message::user(prompt)]).await
    }

    /// Stream chat response (default: falls back to non-streaming)
    async fn chat_stream(&self, messages: &[Message]) -> Result<StreamResult> {
        let text = self.chat(messages).await?;
        Ok(Box::pin(futures::stream::once(async move {
            Ok(StreamChunk {
                delta: text,
                done: true,
            })
        })))
    }

    /// Model name, for status displays.
    fn model(&self) -> &str;
}

/// Provider for an Ollama-compatible server.
pub struct OllamaProvider {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl OllamaProvider {
    pub fn new(endpoint: &str, model: &str, temperature: f32) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature,
        }
    }

    fn format_messages(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| {
                json!({
                    "role": m.role.as_str(),
                    "content": m.content
                })
            })
            .collect()
    }
}

/// Extract the assistant text from a non-streaming `/api/chat` response.
fn parse_chat_response(body: &Value) -> Result<String> {
    if let Some(error) = body.get("error") {
        anyhow::bail!("Inference server error: {}", error);
    }

    Ok(body["message"]["content"]
        .as_str()
        .unwrap_or("")
        .to_string())
}

/// Parse one newline-delimited JSON line from a streaming `/api/chat` response.
fn parse_stream_line(line: &str) -> Option<StreamChunk> {
    let json: Value = serde_json::from_str(line).ok()?;
    Some(StreamChunk {
        delta: json["message"]["content"].as_str().unwrap_or("").to_string(),
        done: json["done"].as_bool().unwrap_or(false),
    })
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": Self::format_messages(messages),
            "options": { "temperature": self.temperature },
            "stream": false
        });

        debug!("Chat request: {}", serde_json::to_string(&body)?);

        let response = self
            .client
            .post(format!("{}/api/chat", self.endpoint))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let response_body: Value = response.json().await?;
        debug!("Chat response: {}", serde_json::to_string(&response_body)?);

        parse_chat_response(&response_body)
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<StreamResult> {
        let body = json!({
            "model": self.model,
            "messages": Self::format_messages(messages),
            "options": { "temperature": self.temperature },
            "stream": true
        });

        debug!("Streaming chat request: {}", serde_json::to_string(&body)?);

        let response = self
            .client
            .post(format!("{}/api/chat", self.endpoint))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        // The server streams newline-delimited JSON
        let stream = async_stream::stream! {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = byte_stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));

                        // Process complete lines
                        while let Some(pos) = buffer.find('\n') {
                            let line = buffer[..pos].to_string();
                            buffer = buffer[pos + 1..].to_string();

                            if line.is_empty() {
                                continue;
                            }

                            if let Some(chunk) = parse_stream_line(&line) {
                                yield Ok(chunk);
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(anyhow::anyhow!("Stream error: {}", e));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_messages_maps_roles() {
        let messages = vec![
            Message::system("persona"),
            Message::user("hello"),
            Message::assistant("hi"),
        ];

        let formatted = OllamaProvider::format_messages(&messages);
        assert_eq!(formatted[0]["role"], "system");
        assert_eq!(formatted[1]["role"], "user");
        assert_eq!(formatted[2]["role"], "assistant");
        assert_eq!(formatted[1]["content"], "hello");
    }

    #[test]
    fn parse_chat_response_extracts_content() {
        let body = json!({
            "message": { "role": "assistant", "content": "42" },
            "done": true
        });
        assert_eq!(parse_chat_response(&body).unwrap(), "42");
    }

    #[test]
    fn parse_chat_response_surfaces_errors() {
        let body = json!({ "error": "model not found" });
        let err = parse_chat_response(&body).unwrap_err();
        assert!(err.to_string().contains("model not found"));
    }

    #[test]
    fn parse_stream_line_reads_delta_and_done() {
        let chunk =
            parse_stream_line(r#"{"message":{"content":"par"},"done":false}"#).unwrap();
        assert_eq!(chunk.delta, "par");
        assert!(!chunk.done);

        let last = parse_stream_line(r#"{"message":{"content":""},"done":true}"#).unwrap();
        assert!(last.done);

        assert!(parse_stream_line("not json").is_none());
    }
}
