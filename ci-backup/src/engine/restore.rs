//! Restore: replay a manifest and its config blobs against a server.
//!
//! Restore is additive and re-runnable. Objects that already exist are
//! reconfigured in place; nothing is ever deleted.

use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

use super::report::RestoreReport;
use super::within_depth;
use crate::gateway::{Gateway, Install, Trigger, Upsert};
use crate::server::CiServer;
use crate::snapshot::{JobRecord, Snapshot};
use crate::store::ConfigKind;
use crate::utils::Result;

#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub build_depth: usize,
    pub manifest_path: PathBuf,
}

pub struct RestoreEngine<'a, S> {
    gateway: &'a Gateway<S>,
    options: RestoreOptions,
}

impl<'a, S: CiServer> RestoreEngine<'a, S> {
    pub fn new(gateway: &'a Gateway<S>, options: RestoreOptions) -> Self {
        Self { gateway, options }
    }

    /// Load and validate the manifest, then restore jobs (with their recent
    /// builds), views, plugins and nodes in that order. Per-object failures
    /// are counted in the report; only an unusable manifest is an error.
    pub async fn run_restore(&self) -> Result<RestoreReport> {
        let started = Instant::now();
        let snapshot = Snapshot::load(&self.options.manifest_path)?;
        snapshot.validate()?;
        if let Some(source) = &snapshot.server_url {
            info!("Restoring snapshot taken from {}", source);
        }

        let mut report = RestoreReport::default();

        info!("Restoring {} jobs...", snapshot.jobs.len());
        for job in &snapshot.jobs {
            self.restore_job(job, &mut report).await;
        }

        info!("Restoring {} views...", snapshot.views.len());
        for view in &snapshot.views {
            info!("Restoring view '{}'", view.name);
            let Some(xml) = self.blob(ConfigKind::View, &view.name) else {
                report.views.skip();
                continue;
            };
            let outcome = self.gateway.create_view(&view.name, Some(&xml)).await;
            log_upsert("view", &view.name, &outcome);
            report.views.record_upsert(&outcome);
        }

        info!("Restoring {} plugins...", snapshot.plugins.len());
        for plugin in &snapshot.plugins {
            info!(
                "Installing plugin '{}' (backed up at version {})",
                plugin.short_name, plugin.version
            );
            let outcome = self.gateway.install_plugin(&plugin.short_name).await;
            if let Install::Failed(fault) = &outcome {
                warn!("Failed to install plugin '{}': {}", plugin.short_name, fault);
            }
            report.plugins.record_install(&outcome);
        }

        info!("Restoring {} nodes...", snapshot.nodes.len());
        for node in &snapshot.nodes {
            info!("Restoring node '{}'", node.name);
            let Some(xml) = self.blob(ConfigKind::Node, &node.name) else {
                report.nodes.skip();
                continue;
            };
            let outcome = self.gateway.create_node(&node.name, &xml).await;
            log_upsert("node", &node.name, &outcome);
            report.nodes.record_upsert(&outcome);
        }

        report.elapsed = started.elapsed();
        info!("Restore complete: {}", report);
        if report.failures() > 0 {
            warn!("{} objects failed to restore", report.failures());
        }

        Ok(report)
    }

    async fn restore_job(&self, job: &JobRecord, report: &mut RestoreReport) {
        info!("Restoring job '{}'", job.name);
        let Some(xml) = self.blob(ConfigKind::Job, &job.name) else {
            report.jobs.skip();
            return;
        };

        let outcome = self.gateway.create_job(&job.name, &xml).await;
        log_upsert("job", &job.name, &outcome);
        report.jobs.record_upsert(&outcome);
        if !outcome.is_success() {
            return;
        }

        // The target numbers replayed builds itself.
        for (index, build) in job.builds.iter().enumerate() {
            if !within_depth(index, self.options.build_depth) {
                break;
            }
            info!("Replaying build {} #{}", job.name, build.number);
            let parameters = build.info.parameters();
            let outcome = self.gateway.trigger_build(&job.name, &parameters).await;
            if let Trigger::Failed(fault) = &outcome {
                warn!("Failed to trigger build {} #{}: {}", job.name, build.number, fault);
            }
            report.builds.record_trigger(&outcome);
        }
    }

    /// Stored config for an object; `None` (logged) when it cannot be read.
    fn blob(&self, kind: ConfigKind, name: &str) -> Option<String> {
        match self.gateway.store().load(kind, name) {
            Ok(xml) => Some(xml),
            Err(e) => {
                warn!("Skipping {} '{}': {}", kind, name, e);
                None
            }
        }
    }
}

fn log_upsert(what: &str, name: &str, outcome: &Upsert) {
    match outcome {
        Upsert::Created => info!("Created {} '{}'", what, name),
        Upsert::Updated => info!("Updated existing {} '{}'", what, name),
        Upsert::Failed(fault) => warn!("Failed to restore {} '{}': {}", what, name, fault),
    }
}
