//! Background worker that owns the engine and runtime.
//!
//! The worker runs in a separate thread with its own tokio runtime.
//! It receives commands from the UI and sends back status updates.

use std::pin::pin;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use anyhow::Result;
use futures::StreamExt;

use crate::cli::build_engine;
use crate::config::Config;
use crate::engine::{Engine, EngineEvent, OllamaProvider};
use crate::runtime::RuntimeManager;

use super::state::{UiMessage, WorkerMessage};

/// Handle to the background worker
pub struct WorkerHandle {
    /// Send commands to the worker
    pub tx: Sender<UiMessage>,
    /// Receive updates from the worker
    pub rx: Receiver<WorkerMessage>,
    /// Thread handle
    _thread: JoinHandle<()>,
}

impl WorkerHandle {
    /// Start the background worker
    pub fn start(model_override: Option<String>) -> Self {
        let (ui_tx, ui_rx) = mpsc::channel::<UiMessage>();
        let (worker_tx, worker_rx) = mpsc::channel::<WorkerMessage>();

        let thread = thread::spawn(move || {
            // Create tokio runtime for this thread
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("Failed to create tokio runtime");

            rt.block_on(async {
                if let Err(e) = worker_loop(model_override, ui_rx, worker_tx.clone()).await {
                    let _ = worker_tx.send(WorkerMessage::Error(e.to_string()));
                }
            });
        });

        Self {
            tx: ui_tx,
            rx: worker_rx,
            _thread: thread,
        }
    }

    /// Send a message to the worker
    pub fn send(&self, msg: UiMessage) -> Result<()> {
        self.tx.send(msg)?;
        Ok(())
    }

    /// Try to receive a message from the worker (non-blocking)
    pub fn try_recv(&self) -> Option<WorkerMessage> {
        self.rx.try_recv().ok()
    }
}

async fn worker_loop(
    model_override: Option<String>,
    rx: Receiver<UiMessage>,
    tx: Sender<WorkerMessage>,
) -> Result<()> {
    let config = Config::load()?;
    let (mut engine, runtime) = build_engine(&config, model_override).await?;

    let _ = tx.send(WorkerMessage::Ready {
        model: engine.model().to_string(),
        endpoint: runtime.endpoint().to_string(),
        memory_count: engine.memory_count(),
        has_embeddings: engine.has_embeddings(),
    });

    send_sessions(&engine, &tx);
    send_models(&runtime, &tx).await;

    while let Ok(msg) = rx.recv() {
        match msg {
            UiMessage::Chat(message) => {
                {
                    let mut events = pin!(engine.chat_events(message));
                    while let Some(event) = events.next().await {
                        let _ = match event {
                            EngineEvent::Progress(status) => {
                                tx.send(WorkerMessage::Progress(status))
                            }
                            EngineEvent::Content(chunk) => {
                                tx.send(WorkerMessage::ContentChunk(chunk))
                            }
                            EngineEvent::Done => tx.send(WorkerMessage::Done),
                        };
                    }
                }
                // The first turn renames the session, so refresh the sidebar
                send_sessions(&engine, &tx);
            }
            UiMessage::NewSession => match engine.new_chat() {
                Ok(id) => {
                    let _ = tx.send(WorkerMessage::SessionChanged {
                        id,
                        messages: Vec::new(),
                    });
                    send_sessions(&engine, &tx);
                }
                Err(e) => {
                    let _ = tx.send(WorkerMessage::Error(e.to_string()));
                }
            },
            UiMessage::LoadSession(session_id) => match engine.load_chat(&session_id) {
                Ok(messages) => {
                    let _ = tx.send(WorkerMessage::SessionChanged {
                        id: session_id,
                        messages,
                    });
                }
                Err(e) => {
                    let _ = tx.send(WorkerMessage::Error(e.to_string()));
                }
            },
            UiMessage::DeleteSession(session_id) => match engine.delete_session(&session_id) {
                Ok(()) => {
                    let current = engine.session_id().to_string();
                    let messages = engine.load_chat(&current).unwrap_or_default();
                    let _ = tx.send(WorkerMessage::SessionChanged {
                        id: current,
                        messages,
                    });
                    send_sessions(&engine, &tx);
                }
                Err(e) => {
                    let _ = tx.send(WorkerMessage::Error(e.to_string()));
                }
            },
            UiMessage::SetMode(mode) => {
                engine.set_mode(mode);
                let _ = tx.send(WorkerMessage::SystemMessage(format!(
                    "Mode switched to **{}**.",
                    mode.as_str().to_uppercase()
                )));
            }
            UiMessage::SetModel(name) => {
                engine.replace_provider(Box::new(OllamaProvider::new(
                    runtime.endpoint(),
                    &name,
                    config.engine.temperature,
                )));
                let _ = tx.send(WorkerMessage::SystemMessage(format!(
                    "Model switched to: {}",
                    name
                )));
            }
            UiMessage::PullModel(name) => {
                let result = runtime
                    .pull_model(&name, |status| {
                        let _ = tx.send(WorkerMessage::PullProgress(status.to_string()));
                    })
                    .await;

                let _ = match result {
                    Ok(()) => tx.send(WorkerMessage::PullFinished {
                        success: true,
                        message: format!("Successfully downloaded '{}'", name),
                    }),
                    Err(e) => tx.send(WorkerMessage::PullFinished {
                        success: false,
                        message: e.to_string(),
                    }),
                };
                send_models(&runtime, &tx).await;
            }
            UiMessage::WipeMemory => match engine.wipe_memory() {
                Ok(()) => {
                    let _ = tx.send(WorkerMessage::SystemMessage(
                        "Memory completely wiped.".to_string(),
                    ));
                }
                Err(e) => {
                    let _ = tx.send(WorkerMessage::Error(e.to_string()));
                }
            },
            UiMessage::RefreshSessions => send_sessions(&engine, &tx),
            UiMessage::RefreshModels => send_models(&runtime, &tx).await,
        }
    }

    Ok(())
}

fn send_sessions(engine: &Engine, tx: &Sender<WorkerMessage>) {
    if let Ok(sessions) = engine.list_sessions() {
        let _ = tx.send(WorkerMessage::Sessions(sessions));
    }
}

async fn send_models(runtime: &RuntimeManager, tx: &Sender<WorkerMessage>) {
    if let Ok(models) = runtime.list_models().await {
        let _ = tx.send(WorkerMessage::Models(models));
    }
}
