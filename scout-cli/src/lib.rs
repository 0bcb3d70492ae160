//! Scout CLI - console host for the scout agent
//!
//! Loads configuration, builds an [`Orchestrator`](scout::orchestrator::Orchestrator)
//! backed by Ollama, and exposes it through the `scout` binary.

pub mod config;
pub mod error;
pub mod host;

pub use error::{CliError, Result};
