//! Desktop GUI (eframe/egui).
//!
//! The UI thread never blocks: a background worker thread owns the engine
//! and runtime behind its own tokio runtime, and the two sides talk over
//! std mpsc channels.

mod app;
mod state;
mod views;
mod worker;

pub use app::DesktopApp;
pub use state::{UiMessage, UiState, WorkerMessage};
pub use worker::WorkerHandle;
