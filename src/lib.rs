//! Ferret - a privacy-first local research assistant
//!
//! This crate provides the core functionality for Ferret, including:
//! - Mode-routing engine over a local LLM (quick / live / deep / context)
//! - Live-search and deep-research agents with web tools
//! - Chat history in SQLite and long-term vector memory
//! - Runtime bootstrapper for an Ollama-compatible inference server
//! - Desktop GUI (egui-based)

pub mod cli;
pub mod config;
#[cfg(feature = "desktop")]
pub mod desktop;
pub mod engine;
pub mod memory;
pub mod paths;
pub mod runtime;
pub mod storage;
pub mod tools;

pub use config::Config;
