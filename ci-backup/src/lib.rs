//! CI server backup and restore.
//!
//! Captures jobs, build history, views, plugins and nodes of a Jenkins-style
//! server into a JSON manifest plus per-object XML configs, and replays them
//! against another server.

pub mod config;
pub mod engine;
pub mod gateway;
pub mod server;
pub mod snapshot;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::{Error, Result};
