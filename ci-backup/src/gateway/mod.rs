//! Fault-tolerant facade over a [`CiServer`].
//!
//! The gateway owns the recovery policy for server faults:
//! - reads of a missing or unreachable object yield a benign default
//!   (sentinel XML, empty collection, empty string, `0`);
//! - creates fall back to an update when the object already exists;
//! - config fetches also refresh the local [`ConfigStore`].
//!
//! It never retries. The only errors it returns are fatal ones
//! (connection at startup, config store writes).

use std::future::Future;
use tracing::{debug, info, warn};

use crate::server::templates::{
    EMPTY_CONFIG_XML, EMPTY_FOLDER_XML, EMPTY_PROMO_CONFIG_XML, EMPTY_VIEW_CONFIG_XML,
    PROMO_RECONFIG_XML,
};
use crate::server::{
    Artifact, BuildInfo, BuildRef, ChangeItem, CiServer, Fault, FaultResult, JobInfo, JobSummary,
    LastBuild, Metadata, NodeInfo, NodeSummary, PluginInfo, PromotionSummary, QueueItem,
    TestReport, ViewSummary,
};
use crate::store::{ConfigKind, ConfigStore};
use crate::utils::{Error, Result};

/// Outcome of a create-or-update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Updated,
    Failed(Fault),
}

impl Upsert {
    pub fn is_success(&self) -> bool {
        !matches!(self, Upsert::Failed(_))
    }
}

/// Outcome of a plugin install request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Install {
    Installed,
    AlreadyInstalled,
    Failed(Fault),
}

impl Install {
    pub fn is_success(&self) -> bool {
        !matches!(self, Install::Failed(_))
    }
}

/// Outcome of a build trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Queued; carries the queue item id when the server reported one.
    Queued(Option<u64>),
    Failed(Fault),
}

impl Trigger {
    pub fn is_success(&self) -> bool {
        matches!(self, Trigger::Queued(_))
    }
}

pub struct Gateway<S> {
    server: S,
    store: ConfigStore,
}

impl<S: CiServer> Gateway<S> {
    pub fn new(server: S, store: ConfigStore) -> Self {
        Self { server, store }
    }

    /// Verify the server is reachable and the credentials are accepted.
    pub async fn connect(server: S, store: ConfigStore) -> Result<Self> {
        match server.whoami().await {
            Ok(identity) => {
                info!("Connected to CI server as {}", identity.display_name());
                Ok(Self::new(server, store))
            }
            Err(fault) => Err(Error::Connection(fault.to_string())),
        }
    }

    pub fn server(&self) -> &S {
        &self.server
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    // ── Listings ──

    pub async fn jobs(&self) -> Vec<JobSummary> {
        or_empty("job list", self.server.get_jobs().await)
    }

    pub async fn views(&self) -> Vec<ViewSummary> {
        or_empty("view list", self.server.get_views().await)
    }

    pub async fn nodes(&self) -> Vec<NodeSummary> {
        or_empty("node list", self.server.get_nodes().await)
    }

    /// Installed plugins in server order. A plugin reported more than once
    /// (e.g. under both short and long name) is kept once.
    pub async fn plugins(&self) -> Vec<PluginInfo> {
        let mut plugins = or_empty("plugin list", self.server.get_plugins().await);
        let mut seen = std::collections::HashSet::new();
        plugins.retain(|p| seen.insert(p.short_name.clone()));
        plugins
    }

    // ── Config fetches (persisted to the store) ──

    pub async fn job_config(&self, name: &str) -> Result<String> {
        let fetched = self.server.get_job_config(name).await;
        self.persist_config(ConfigKind::Job, name, fetched, EMPTY_CONFIG_XML)
    }

    pub async fn folder_config(&self, name: &str) -> Result<String> {
        let fetched = self.server.get_job_config(name).await;
        self.persist_config(ConfigKind::Job, name, fetched, EMPTY_FOLDER_XML)
    }

    pub async fn view_config(&self, name: &str) -> Result<String> {
        let fetched = self.server.get_view_config(name).await;
        self.persist_config(ConfigKind::View, name, fetched, EMPTY_VIEW_CONFIG_XML)
    }

    pub async fn node_config(&self, name: &str) -> Result<String> {
        let fetched = self.server.get_node_config(name).await;
        self.persist_config(ConfigKind::Node, name, fetched, EMPTY_CONFIG_XML)
    }

    /// Stored under `<job>/<promotion>` so processes of one job do not
    /// overwrite each other.
    pub async fn promotion_config(&self, job: &str, promotion: &str) -> Result<String> {
        let fetched = self.server.get_promotion_config(job, promotion).await;
        let key = promotion_key(job, promotion);
        self.persist_config(ConfigKind::Promotion, &key, fetched, EMPTY_PROMO_CONFIG_XML)
    }

    fn persist_config(
        &self,
        kind: ConfigKind,
        name: &str,
        fetched: FaultResult<String>,
        sentinel: &str,
    ) -> Result<String> {
        let xml = match fetched {
            Ok(xml) => xml,
            Err(fault) => {
                warn!("Using empty {} config for '{}': {}", kind, name, fault);
                sentinel.to_string()
            }
        };
        self.store.save(kind, name, &xml)?;
        Ok(xml)
    }

    // ── Build metadata ──

    pub async fn job_info(&self, name: &str) -> FaultResult<JobInfo> {
        self.server.get_job_info(name).await
    }

    pub async fn builds(&self, job: &str) -> Vec<BuildRef> {
        match self.server.get_job_info(job).await {
            Ok(info) => info.builds,
            Err(fault) => {
                warn!("No build list for job '{}': {}", job, fault);
                Vec::new()
            }
        }
    }

    pub async fn builds_count(&self, job: &str) -> usize {
        self.builds(job).await.len()
    }

    /// `0` means the job has no such build.
    pub async fn last_build_number(&self, job: &str, which: LastBuild) -> u64 {
        match self.server.get_job_info(job).await {
            Ok(info) => info.last_build_number(which).unwrap_or(0),
            Err(fault) => {
                debug!("No {} for job '{}': {}", which.field(), job, fault);
                0
            }
        }
    }

    /// Build info, or an otherwise empty record carrying `number`.
    pub async fn build_info(&self, job: &str, number: u64) -> BuildInfo {
        match self.server.get_build_info(job, number).await {
            Ok(info) => info,
            Err(fault) => {
                warn!("No info for build {} #{}: {}", job, number, fault);
                BuildInfo {
                    number,
                    ..Default::default()
                }
            }
        }
    }

    pub async fn console_output(&self, job: &str, number: u64) -> String {
        match self.server.get_build_console_output(job, number).await {
            Ok(text) => text,
            Err(fault) => {
                debug!("No console output for {} #{}: {}", job, number, fault);
                String::new()
            }
        }
    }

    pub async fn test_report(&self, job: &str, number: u64) -> TestReport {
        match self.server.get_build_test_report(job, number).await {
            Ok(report) => report,
            Err(fault) => {
                debug!("No test report for {} #{}: {}", job, number, fault);
                TestReport::default()
            }
        }
    }

    /// Change items of one build. Each call fetches the build info again;
    /// callers already holding a [`BuildInfo`] should use
    /// [`BuildInfo::change_items`] instead.
    pub async fn changeset(&self, job: &str, number: u64) -> Vec<ChangeItem> {
        match self.server.get_build_info(job, number).await {
            Ok(info) => info.change_items(),
            Err(_) => Vec::new(),
        }
    }

    /// Artifacts of one build, at the cost of one build info fetch like
    /// [`Gateway::changeset`].
    pub async fn artifacts(&self, job: &str, number: u64) -> Vec<Artifact> {
        match self.server.get_build_info(job, number).await {
            Ok(info) => info.artifacts(),
            Err(_) => Vec::new(),
        }
    }

    pub async fn build_stages(&self, job: &str, number: u64) -> FaultResult<Metadata> {
        self.server.get_build_stages(job, number).await
    }

    // ── Upserts ──

    pub async fn create_job(&self, name: &str, config_xml: &str) -> Upsert {
        let created = self.server.create_job(name, config_xml).await;
        upsert("job", name, created, || self.server.reconfig_job(name, config_xml)).await
    }

    /// Create a folder, using an empty folder config when none is given.
    pub async fn create_folder(&self, name: &str, config_xml: Option<&str>) -> Upsert {
        let config_xml = config_xml.unwrap_or(EMPTY_FOLDER_XML);
        let created = self.server.create_job(name, config_xml).await;
        upsert("folder", name, created, || self.server.reconfig_job(name, config_xml)).await
    }

    /// Create a view, using an empty list view config when none is given.
    pub async fn create_view(&self, name: &str, config_xml: Option<&str>) -> Upsert {
        let config_xml = config_xml.unwrap_or(EMPTY_VIEW_CONFIG_XML);
        let created = self.server.create_view(name, config_xml).await;
        upsert("view", name, created, || self.server.reconfig_view(name, config_xml)).await
    }

    pub async fn create_node(&self, name: &str, config_xml: &str) -> Upsert {
        let created = self.server.create_node(name, config_xml).await;
        upsert("node", name, created, || self.server.reconfig_node(name, config_xml)).await
    }

    pub async fn create_promotion(&self, job: &str, promotion: &str, config_xml: Option<&str>) -> Upsert {
        let config_xml = config_xml.unwrap_or(EMPTY_PROMO_CONFIG_XML);
        let created = self.server.create_promotion(job, promotion, config_xml).await;
        let label = promotion_key(job, promotion);
        upsert("promotion", &label, created, || {
            self.server.reconfig_promotion(job, promotion, config_xml)
        })
        .await
    }

    pub async fn install_plugin(&self, name: &str) -> Install {
        match self.server.install_plugin(name).await {
            Ok(()) => Install::Installed,
            Err(fault) if fault.is_already_exists() => Install::AlreadyInstalled,
            Err(fault) => Install::Failed(fault),
        }
    }

    /// Queue a build. A server answering "already exists" (the build is
    /// already queued) counts as queued.
    pub async fn trigger_build(&self, job: &str, parameters: &[(String, String)]) -> Trigger {
        match self.server.build_job(job, parameters).await {
            Ok(queue_id) => Trigger::Queued(queue_id),
            Err(fault) if fault.is_already_exists() => Trigger::Queued(None),
            Err(fault) => Trigger::Failed(fault),
        }
    }

    // ── Pass-through operations ──

    pub async fn update_job(&self, name: &str, config_xml: &str) -> FaultResult<()> {
        self.server.reconfig_job(name, config_xml).await
    }

    pub async fn copy_job(&self, from: &str, to: &str) -> FaultResult<()> {
        self.server.copy_job(from, to).await
    }

    pub async fn delete_job(&self, name: &str) -> FaultResult<()> {
        self.server.delete_job(name).await
    }

    pub async fn enable_job(&self, name: &str) -> FaultResult<()> {
        self.server.enable_job(name).await
    }

    pub async fn disable_job(&self, name: &str) -> FaultResult<()> {
        self.server.disable_job(name).await
    }

    pub async fn set_next_build_number(&self, name: &str, number: u64) -> FaultResult<()> {
        self.server.set_next_build_number(name, number).await
    }

    pub async fn folder_info(&self, name: &str) -> FaultResult<JobInfo> {
        self.server.get_job_info(name).await
    }

    pub async fn update_folder(&self, name: &str, config_xml: &str) -> FaultResult<()> {
        self.server.reconfig_job(name, config_xml).await
    }

    pub async fn copy_folder(&self, from: &str, to: &str) -> FaultResult<()> {
        self.server.copy_job(from, to).await
    }

    pub async fn delete_folder(&self, name: &str) -> FaultResult<()> {
        self.server.delete_job(name).await
    }

    pub async fn view_exists(&self, name: &str) -> FaultResult<bool> {
        self.server.view_exists(name).await
    }

    pub async fn jobs_by_view(&self, name: &str) -> FaultResult<Vec<JobSummary>> {
        self.server.get_jobs_by_view(name).await
    }

    pub async fn update_view(&self, name: &str, config_xml: &str) -> FaultResult<()> {
        self.server.reconfig_view(name, config_xml).await
    }

    pub async fn delete_view(&self, name: &str) -> FaultResult<()> {
        self.server.delete_view(name).await
    }

    pub async fn plugin_info(&self, name: &str) -> FaultResult<PluginInfo> {
        self.server.get_plugin_info(name).await
    }

    pub async fn plugin_version(&self, name: &str) -> FaultResult<String> {
        Ok(self.server.get_plugin_info(name).await?.version)
    }

    pub async fn node_info(&self, name: &str) -> FaultResult<NodeInfo> {
        self.server.get_node_info(name).await
    }

    pub async fn update_node(&self, name: &str, config_xml: &str) -> FaultResult<()> {
        self.server.reconfig_node(name, config_xml).await
    }

    pub async fn delete_node(&self, name: &str) -> FaultResult<()> {
        self.server.delete_node(name).await
    }

    pub async fn enable_node(&self, name: &str) -> FaultResult<()> {
        self.server.enable_node(name).await
    }

    pub async fn disable_node(&self, name: &str, message: &str) -> FaultResult<()> {
        self.server.disable_node(name, message).await
    }

    pub async fn promotions(&self, job: &str) -> FaultResult<Vec<PromotionSummary>> {
        self.server.get_promotions(job).await
    }

    pub async fn promotion_exists(&self, job: &str, promotion: &str) -> FaultResult<bool> {
        self.server.promotion_exists(job, promotion).await
    }

    /// Reconfigure a promotion, using the default process config when none is given.
    pub async fn update_promotion(&self, job: &str, promotion: &str, config_xml: Option<&str>) -> FaultResult<()> {
        let config_xml = config_xml.unwrap_or(PROMO_RECONFIG_XML);
        self.server.reconfig_promotion(job, promotion, config_xml).await
    }

    pub async fn delete_promotion(&self, job: &str, promotion: &str) -> FaultResult<()> {
        self.server.delete_promotion(job, promotion).await
    }

    pub async fn queue_info(&self) -> FaultResult<Vec<QueueItem>> {
        self.server.get_queue_info().await
    }

    pub async fn cancel_queue_item(&self, id: u64) -> FaultResult<()> {
        self.server.cancel_queue_item(id).await
    }
}

/// Create-or-update: only an "already exists" fault falls back to `update`.
async fn upsert<F, Fut>(what: &str, name: &str, created: FaultResult<()>, update: F) -> Upsert
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = FaultResult<()>>,
{
    match created {
        Ok(()) => Upsert::Created,
        Err(fault) if fault.is_already_exists() => {
            debug!("{} '{}' already exists, updating instead", what, name);
            match update().await {
                Ok(()) => Upsert::Updated,
                Err(fault) => Upsert::Failed(fault),
            }
        }
        Err(fault) => Upsert::Failed(fault),
    }
}

fn or_empty<T>(what: &str, fetched: FaultResult<Vec<T>>) -> Vec<T> {
    fetched.unwrap_or_else(|fault| {
        warn!("Could not fetch {}: {}", what, fault);
        Vec::new()
    })
}

fn promotion_key(job: &str, promotion: &str) -> String {
    format!("{}/{}", job, promotion)
}
