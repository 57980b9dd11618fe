//! exsync - Todoist to Exist.io habit sync
//!
//! Listens for Todoist webhooks, mirrors task completions into Exist.io
//! custom tags, and keeps a monthly calendar of each habit as comments on
//! the task.
//!
//! # Core Concepts
//!
//! - **Binding**: a Todoist task linked to one Exist.io tag
//! - **Commands**: `existio: ...` comments or `/...` descriptions that
//!   bind, release, or correct a task
//! - **Stats comments**: one rendered month per comment, found again by
//!   their header line
//! - **Effective date**: "today" rolls over at a configurable hour
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `exsync.toml` and the environment
//! - `error`: Error types and result aliases
//! - `store`: Task to tag bindings persisted in a flat file
//! - `lock`: File locking and atomic writes for the bindings file
//! - `calendar`: Effective date and month arithmetic
//! - `command`: Command grammar
//! - `clients`: Exist.io and Todoist HTTP clients behind traits
//! - `render`: Month calendar rendering
//! - `reconcile`: Stats comment reconciliation
//! - `webhook`: Todoist webhook payloads and signatures
//! - `sync`: Event dispatch and handlers
//! - `server`: Webhook HTTP server

pub mod calendar;
pub mod cli;
pub mod clients;
pub mod command;
pub mod config;
pub mod error;
pub mod lock;
pub mod output;
pub mod reconcile;
pub mod render;
pub mod server;
pub mod store;
pub mod sync;
pub mod webhook;

pub use error::{Error, Result};
