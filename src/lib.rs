//! cmdpal - AI-assisted terminal command palette.
//!
//! This library mediates between a natural-language goal and a single
//! executable shell command:
//!
//! - **Context collection** of situational facts (directory, shell, git
//!   status, file sample) with bounded size and fixed timeouts
//! - **Provider abstraction** over interchangeable model backends (a hosted
//!   chat API, local Ollama inference, a deterministic mock)
//! - **Safety scoring** and dry-run rewriting of suggested commands
//! - **Audit logging** of every suggestion and error, with rotation
//!
//! # Architecture
//!
//! The modules compose into one request lifecycle, owned by
//! [`pipeline::SuggestionPipeline`]:
//!
//! - [`config`] - Configuration (provider selection, credentials, paths)
//! - [`context`] - Per-request context collection
//! - [`provider`] - Model backends behind a single `suggest` contract
//! - [`http_transport`] - HTTP transport abstraction for the backends
//! - [`safety`] - Risk scoring, confirmation policy, dry-run rewriting
//! - [`audit`] - Append-only audit log with rotation and statistics
//! - [`pipeline`] - The suggestion orchestrator
//! - [`server`] - HTTP daemon exposing the pipeline
//! - [`cli`] - Command-line front-end talking to the daemon
//!
//! # Example
//!
//! ```ignore
//! use cmdpal::config::Config;
//! use cmdpal::pipeline::{SuggestionPipeline, SuggestionRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pipeline = SuggestionPipeline::from_config(&config)?;
//!
//!     let response = pipeline
//!         .suggest(&SuggestionRequest::new("list files modified today"))
//!         .await?;
//!     println!("{}", response.command);
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod context;
pub mod http_transport;
pub mod pipeline;
pub mod provider;
pub mod safety;
pub mod server;
