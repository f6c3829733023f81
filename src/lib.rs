//! Mixtape Core Library
//!
//! Batch orchestration for media downloads: a pending queue with a
//! removal-safe cursor, a two-level pause gate, deferred retries for
//! access-denied items, and a serialized stream of progress snapshots.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`item`] - Work items and the output hints derived from them
//! - [`queue`] - Pending queue with a monotonically advancing cursor
//! - [`pause`] - Global pause gate plus per-item suspend set
//! - [`retry`] - Failure classification, retry policy and retry ledger
//! - [`progress`] - Progress snapshots and the publishing hub
//! - [`orchestrator`] - Primary pass, retry waves and control surface
//! - [`processor`] - Item processor contract and an HTTP implementation
//! - [`resolver`] - Input resolution contract and a direct URL resolver
//! - [`naming`] - Name cleaning and naming-template rendering
//! - [`config`] - Orchestrator settings and the JSON file config

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod item;
pub mod naming;
pub mod orchestrator;
pub mod pause;
pub mod processor;
pub mod progress;
pub mod queue;
pub mod resolver;
pub mod retry;
mod user_agent;

// Re-export commonly used types
pub use config::{ConfigError, FileConfig, OrchestratorConfig, resolve_default_config_path};
pub use item::{OutputHints, WorkItem};
pub use orchestrator::{Orchestrator, OrchestratorError, RunSummary};
pub use pause::{PauseMode, WaitError};
pub use processor::{
    HttpItemProcessor, ItemProcessor, ProcessError, ProcessRequest, ProgressReporter,
};
pub use progress::{Phase, ProgressSnapshot};
pub use resolver::{DirectResolver, MediaResolver, ResolveError};
pub use retry::{FailureType, RetryDecision, RetryPolicy, classify_failure};
