//! Backup: walk the live server and capture it into a [`Snapshot`].

use chrono::Utc;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

use super::report::BackupReport;
use super::within_depth;
use crate::gateway::Gateway;
use crate::server::CiServer;
use crate::snapshot::{BuildRecord, JobRecord, NodeRecord, PluginRecord, Snapshot, ViewRecord};
use crate::utils::Result;

#[derive(Debug, Clone)]
pub struct BackupOptions {
    /// Index of the oldest build to capture, counting from the newest (0).
    pub build_depth: usize,
    pub manifest_path: PathBuf,
    /// Recorded in the manifest for reference.
    pub source_url: Option<String>,
}

pub struct BackupEngine<'a, S> {
    gateway: &'a Gateway<S>,
    options: BackupOptions,
}

impl<'a, S: CiServer> BackupEngine<'a, S> {
    pub fn new(gateway: &'a Gateway<S>, options: BackupOptions) -> Self {
        Self { gateway, options }
    }

    /// Capture jobs, views, plugins and nodes, persist every config blob and
    /// write the manifest. Only store and manifest write failures abort.
    pub async fn run_backup(&self) -> Result<Snapshot> {
        let started = Instant::now();
        let mut snapshot = Snapshot {
            created_at: Some(Utc::now()),
            server_url: self.options.source_url.clone(),
            ..Default::default()
        };

        info!("Saving jobs...");
        for summary in self.gateway.jobs().await {
            let job = self.backup_job(JobRecord::from(summary)).await?;
            snapshot.jobs.push(job);
        }

        info!("Saving views...");
        for summary in self.gateway.views().await {
            info!("Saving view '{}'", summary.name);
            self.gateway.view_config(&summary.name).await?;
            snapshot.views.push(ViewRecord::from(summary));
        }

        info!("Saving plugins...");
        snapshot.plugins = self
            .gateway
            .plugins()
            .await
            .into_iter()
            .map(PluginRecord::from)
            .collect();
        info!("Saved {} plugins", snapshot.plugins.len());

        info!("Saving nodes...");
        for summary in self.gateway.nodes().await {
            info!("Saving node '{}'", summary.name);
            self.gateway.node_config(&summary.name).await?;
            snapshot.nodes.push(NodeRecord::from(summary));
        }

        for dup in snapshot.duplicates() {
            warn!("Server reported {} '{}' more than once", dup.collection, dup.name);
        }

        let manifest_bytes = snapshot.save(&self.options.manifest_path)?;
        info!("Manifest written: {}", self.options.manifest_path.display());

        let report = BackupReport {
            jobs: snapshot.jobs.len(),
            builds: snapshot.build_count(),
            views: snapshot.views.len(),
            plugins: snapshot.plugins.len(),
            nodes: snapshot.nodes.len(),
            manifest_bytes,
            elapsed: started.elapsed(),
        };
        info!("Backup complete: {}", report);

        Ok(snapshot)
    }

    async fn backup_job(&self, mut job: JobRecord) -> Result<JobRecord> {
        info!("Saving job '{}'", job.name);
        self.gateway.job_config(&job.name).await?;

        for (index, build) in self.gateway.builds(&job.name).await.into_iter().enumerate() {
            if !within_depth(index, self.options.build_depth) {
                break;
            }
            info!("Saving build {} #{}", job.name, build.number);

            let mut record = BuildRecord::from(build);
            let info = self.gateway.build_info(&job.name, record.number).await;
            record.console_output = self.gateway.console_output(&job.name, record.number).await;
            record.test_report = self.gateway.test_report(&job.name, record.number).await;
            // Change sets and artifacts are part of the build info payload.
            record.changeset = info.change_items();
            record.artifacts = info.artifacts();
            record.info = info;
            job.builds.push(record);
        }

        Ok(job)
    }
}
