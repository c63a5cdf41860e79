//! Application state shared between UI and worker

use crate::engine::Mode;
use crate::storage::{SessionSummary, StoredMessage};

/// Message from UI to worker
#[derive(Debug, Clone)]
pub enum UiMessage {
    /// Send a chat message
    Chat(String),
    /// Create a new session
    NewSession,
    /// Load a session by ID
    LoadSession(String),
    /// Delete a session by ID
    DeleteSession(String),
    /// Switch the operating mode
    SetMode(Mode),
    /// Switch the active model
    SetModel(String),
    /// Download a model
    PullModel(String),
    /// Wipe the vector memory
    WipeMemory,
    /// Request session list refresh
    RefreshSessions,
    /// Request model list refresh
    RefreshModels,
}

/// Message from worker to UI
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    /// Engine is ready
    Ready {
        model: String,
        endpoint: String,
        memory_count: usize,
        has_embeddings: bool,
    },
    /// Transient status line while a turn is processed
    Progress(String),
    /// Streaming reply chunk
    ContentChunk(String),
    /// Turn complete
    Done,
    /// Error occurred
    Error(String),
    /// Session list update
    Sessions(Vec<SessionSummary>),
    /// Active session switched; messages are its transcript
    SessionChanged {
        id: String,
        messages: Vec<StoredMessage>,
    },
    /// Installed model list
    Models(Vec<String>),
    /// Model pull status line
    PullProgress(String),
    /// Model pull finished
    PullFinished { success: bool, message: String },
    /// System message for display (command output, confirmations)
    SystemMessage(String),
}

/// A chat message for display
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// UI state
pub struct UiState {
    /// Chat messages to display
    pub messages: Vec<ChatMessage>,
    /// Current input text
    pub input: String,
    /// Whether the engine is processing a turn
    pub is_loading: bool,
    /// Current streaming response (being built)
    pub streaming_content: String,
    /// Transient progress line shown while loading
    pub progress: Option<String>,
    /// Error message to display
    pub error: Option<String>,
    /// Available sessions
    pub sessions: Vec<SessionSummary>,
    /// Active session id
    pub current_session: Option<String>,
    /// Selected mode
    pub mode: Mode,
    /// Active model name
    pub model: String,
    /// Models installed on the server
    pub models: Vec<String>,
    /// Server endpoint (shown in settings)
    pub endpoint: String,
    /// Memory entry count
    pub memory_count: usize,
    /// Whether embeddings are enabled
    pub has_embeddings: bool,
    /// Whether the settings window is open
    pub show_settings: bool,
    /// Model name typed into the pull box
    pub pull_input: String,
    /// Last pull status line
    pub pull_status: Option<String>,
    /// Whether a pull is in flight
    pub pulling: bool,
    /// Scroll to bottom on next frame
    pub scroll_to_bottom: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            input: String::new(),
            is_loading: true, // until Ready arrives
            streaming_content: String::new(),
            progress: None,
            error: None,
            sessions: Vec::new(),
            current_session: None,
            mode: Mode::default(),
            model: String::new(),
            models: Vec::new(),
            endpoint: String::new(),
            memory_count: 0,
            has_embeddings: false,
            show_settings: false,
            pull_input: String::new(),
            pull_status: None,
            pulling: false,
            scroll_to_bottom: false,
        }
    }
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a message from the worker
    pub fn handle_worker_message(&mut self, msg: WorkerMessage) {
        match msg {
            WorkerMessage::Ready {
                model,
                endpoint,
                memory_count,
                has_embeddings,
            } => {
                self.model = model;
                self.endpoint = endpoint;
                self.memory_count = memory_count;
                self.has_embeddings = has_embeddings;
                self.is_loading = false;
            }
            WorkerMessage::Progress(status) => {
                self.progress = Some(status);
            }
            WorkerMessage::ContentChunk(content) => {
                self.progress = None;
                self.streaming_content.push_str(&content);
                self.scroll_to_bottom = true;
            }
            WorkerMessage::Done => {
                if !self.streaming_content.is_empty() {
                    self.messages.push(ChatMessage {
                        role: MessageRole::Assistant,
                        content: std::mem::take(&mut self.streaming_content),
                    });
                }
                self.progress = None;
                self.is_loading = false;
                self.scroll_to_bottom = true;
            }
            WorkerMessage::Error(err) => {
                self.error = Some(err);
                self.is_loading = false;
                self.progress = None;
                self.streaming_content.clear();
            }
            WorkerMessage::Sessions(sessions) => {
                self.sessions = sessions;
            }
            WorkerMessage::SessionChanged { id, messages } => {
                self.current_session = Some(id);
                self.messages = messages
                    .into_iter()
                    .map(|msg| ChatMessage {
                        role: match msg.role.as_str() {
                            "user" => MessageRole::User,
                            _ => MessageRole::Assistant,
                        },
                        content: msg.content,
                    })
                    .collect();
                self.streaming_content.clear();
                self.scroll_to_bottom = true;
            }
            WorkerMessage::Models(models) => {
                self.models = models;
            }
            WorkerMessage::PullProgress(status) => {
                self.pull_status = Some(status);
            }
            WorkerMessage::PullFinished { success, message } => {
                self.pulling = false;
                self.pull_status = Some(message);
                if success {
                    self.pull_input.clear();
                }
            }
            WorkerMessage::SystemMessage(text) => {
                self.messages.push(ChatMessage {
                    role: MessageRole::System,
                    content: text,
                });
                self.scroll_to_bottom = true;
            }
        }
    }

    /// Add a user message
    pub fn add_user_message(&mut self, content: String) {
        self.messages.push(ChatMessage {
            role: MessageRole::User,
            content,
        });
        self.scroll_to_bottom = true;
    }

    /// Clear error
    pub fn clear_error(&mut self) {
        self.error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_finalizes_streaming_content() {
        let mut state = UiState::new();
        state.handle_worker_message(WorkerMessage::ContentChunk("Hello ".to_string()));
        state.handle_worker_message(WorkerMessage::ContentChunk("world".to_string()));
        state.handle_worker_message(WorkerMessage::Done);

        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].content, "Hello world");
        assert_eq!(state.messages[0].role, MessageRole::Assistant);
        assert!(state.streaming_content.is_empty());
        assert!(!state.is_loading);
    }

    #[test]
    fn progress_clears_when_content_arrives() {
        let mut state = UiState::new();
        state.handle_worker_message(WorkerMessage::Progress("Choosing a tool...".to_string()));
        assert!(state.progress.is_some());

        state.handle_worker_message(WorkerMessage::ContentChunk("answer".to_string()));
        assert!(state.progress.is_none());
    }

    #[test]
    fn session_change_replaces_transcript() {
        let mut state = UiState::new();
        state.add_user_message("old".to_string());

        state.handle_worker_message(WorkerMessage::SessionChanged {
            id: "abc".to_string(),
            messages: vec![
                StoredMessage {
                    role: "user".to_string(),
                    content: "hi".to_string(),
                },
                StoredMessage {
                    role: "assistant".to_string(),
                    content: "hello".to_string(),
                },
            ],
        });

        assert_eq!(state.current_session.as_deref(), Some("abc"));
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].role, MessageRole::User);
        assert_eq!(state.messages[1].role, MessageRole::Assistant);
    }

    #[test]
    fn error_stops_loading_and_drops_partial_reply() {
        let mut state = UiState::new();
        state.handle_worker_message(WorkerMessage::ContentChunk("partial".to_string()));
        state.handle_worker_message(WorkerMessage::Error("boom".to_string()));

        assert_eq!(state.error.as_deref(), Some("boom"));
        assert!(state.streaming_content.is_empty());
        assert!(!state.is_loading);
    }

    #[test]
    fn pull_finished_clears_input_on_success() {
        let mut state = UiState::new();
        state.pull_input = "llama3.2".to_string();
        state.pulling = true;

        state.handle_worker_message(WorkerMessage::PullFinished {
            success: true,
            message: "done".to_string(),
        });

        assert!(!state.pulling);
        assert!(state.pull_input.is_empty());
    }
}
