//! Interface to the remote CI server.
//!
//! [`CiServer`] exposes one method per raw capability of the server. Every
//! call either returns the requested data or a [`Fault`]; it never retries
//! and never substitutes defaults. Fallback policy lives in
//! [`crate::gateway`].

pub mod client;
pub mod models;
pub mod templates;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use std::fmt;

pub use client::JenkinsClient;
pub use models::*;

/// Broad classification of a server failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    NotFound,
    Conflict,
    Transient,
    Unknown,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultKind::NotFound => "not found",
            FaultKind::Conflict => "conflict",
            FaultKind::Transient => "transient",
            FaultKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A recoverable failure reported by the CI server.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} fault: {message}")]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FaultKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Conflict, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Transient, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Unknown, message)
    }

    /// True when the server refused a create because the object exists.
    /// Servers do not always use a dedicated status for this, so the
    /// message is checked as well as the kind.
    pub fn is_already_exists(&self) -> bool {
        self.kind == FaultKind::Conflict
            || self.message.to_ascii_lowercase().contains("already exists")
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == FaultKind::NotFound
    }
}

pub type FaultResult<T> = std::result::Result<T, Fault>;

/// Raw capabilities of a CI server.
#[async_trait]
pub trait CiServer: Send + Sync {
    async fn whoami(&self) -> FaultResult<Identity>;

    // Jobs and folders (folders are jobs with a folder config)
    async fn get_jobs(&self) -> FaultResult<Vec<JobSummary>>;
    async fn get_job_info(&self, name: &str) -> FaultResult<JobInfo>;
    async fn get_job_config(&self, name: &str) -> FaultResult<String>;
    async fn create_job(&self, name: &str, config_xml: &str) -> FaultResult<()>;
    async fn reconfig_job(&self, name: &str, config_xml: &str) -> FaultResult<()>;
    async fn copy_job(&self, from: &str, to: &str) -> FaultResult<()>;
    async fn delete_job(&self, name: &str) -> FaultResult<()>;
    async fn enable_job(&self, name: &str) -> FaultResult<()>;
    async fn disable_job(&self, name: &str) -> FaultResult<()>;
    /// Queue a build; returns the queue item id when the server reports one.
    async fn build_job(&self, name: &str, parameters: &[(String, String)]) -> FaultResult<Option<u64>>;
    async fn set_next_build_number(&self, name: &str, number: u64) -> FaultResult<()>;

    // Builds
    async fn get_build_info(&self, name: &str, number: u64) -> FaultResult<BuildInfo>;
    async fn get_build_console_output(&self, name: &str, number: u64) -> FaultResult<String>;
    async fn get_build_test_report(&self, name: &str, number: u64) -> FaultResult<TestReport>;
    async fn get_build_stages(&self, name: &str, number: u64) -> FaultResult<Metadata>;

    // Views
    async fn get_views(&self) -> FaultResult<Vec<ViewSummary>>;
    async fn view_exists(&self, name: &str) -> FaultResult<bool>;
    async fn get_jobs_by_view(&self, name: &str) -> FaultResult<Vec<JobSummary>>;
    async fn get_view_config(&self, name: &str) -> FaultResult<String>;
    async fn create_view(&self, name: &str, config_xml: &str) -> FaultResult<()>;
    async fn reconfig_view(&self, name: &str, config_xml: &str) -> FaultResult<()>;
    async fn delete_view(&self, name: &str) -> FaultResult<()>;

    // Plugins
    async fn get_plugins(&self) -> FaultResult<Vec<PluginInfo>>;
    async fn get_plugin_info(&self, name: &str) -> FaultResult<PluginInfo>;
    async fn install_plugin(&self, name: &str) -> FaultResult<()>;

    // Nodes
    async fn get_nodes(&self) -> FaultResult<Vec<NodeSummary>>;
    async fn get_node_info(&self, name: &str) -> FaultResult<NodeInfo>;
    async fn get_node_config(&self, name: &str) -> FaultResult<String>;
    async fn create_node(&self, name: &str, config_xml: &str) -> FaultResult<()>;
    async fn reconfig_node(&self, name: &str, config_xml: &str) -> FaultResult<()>;
    async fn delete_node(&self, name: &str) -> FaultResult<()>;
    async fn enable_node(&self, name: &str) -> FaultResult<()>;
    async fn disable_node(&self, name: &str, message: &str) -> FaultResult<()>;

    // Promotions
    async fn get_promotions(&self, job: &str) -> FaultResult<Vec<PromotionSummary>>;
    async fn promotion_exists(&self, job: &str, promotion: &str) -> FaultResult<bool>;
    async fn get_promotion_config(&self, job: &str, promotion: &str) -> FaultResult<String>;
    async fn create_promotion(&self, job: &str, promotion: &str, config_xml: &str) -> FaultResult<()>;
    async fn reconfig_promotion(&self, job: &str, promotion: &str, config_xml: &str) -> FaultResult<()>;
    async fn delete_promotion(&self, job: &str, promotion: &str) -> FaultResult<()>;

    // Build queue
    async fn get_queue_info(&self) -> FaultResult<Vec<QueueItem>>;
    async fn cancel_queue_item(&self, id: u64) -> FaultResult<()>;
}
