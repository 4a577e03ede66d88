//! # Courier TUI
//!
//! A terminal-based API client with collections, environments and a
//! collection runner.
//!
//! ## Features
//! - HTTP methods: GET, POST, PUT, PATCH, DELETE, HEAD, OPTIONS
//! - Collections with nested folders, stored as YAML
//! - Environments with `{{variable}}` substitution
//! - Pre-request and post-response scripts with assertions
//! - Collection runner with stop-on-failure, delay and cancellation
//! - JSON run reports
//!
//! ## Architecture
//! Actor-based with channels:
//! - UI Layer (Ratatui) - synchronous
//! - App Layer (State machine)
//! - Network Layer (Tokio runtime)

pub mod app;
pub mod config;
pub mod constants;
pub mod errors;
pub mod messages;
pub mod models;
pub mod network;
pub mod runner;
pub mod scripting;
pub mod storage;
pub mod ui;

// Re-export commonly used types
pub use models::{Request, HttpMethod, Header, AuthType, Collection, CollectionItem, Environment};
pub use messages::{UiEvent, NetworkCommand, NetworkResponse, RenderState};
pub use app::{AppState, AppActor};
pub use network::{NetworkActor, ReqwestSender};
pub use runner::{prepare_run, RunConfig, RunReport, RunSession, Scheduler};
pub use scripting::DirectiveScriptRunner;
