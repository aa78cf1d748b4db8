//! Per-run counters and their human-readable summary.

use std::fmt;
use std::time::Duration;

use crate::gateway::{Install, Trigger, Upsert};

/// Backup totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackupReport {
    pub jobs: usize,
    pub builds: usize,
    pub views: usize,
    pub plugins: usize,
    pub nodes: usize,
    pub manifest_bytes: u64,
    pub elapsed: Duration,
}

impl fmt::Display for BackupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} jobs ({} builds), {} views, {} plugins, {} nodes; manifest {} in {}",
            self.jobs,
            self.builds,
            self.views,
            self.plugins,
            self.nodes,
            format_bytes(self.manifest_bytes),
            format_duration(self.elapsed.as_secs())
        )
    }
}

/// Outcome counts for one kind of object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindTally {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl KindTally {
    pub fn record_upsert(&mut self, outcome: &Upsert) {
        match outcome {
            Upsert::Created => self.created += 1,
            Upsert::Updated => self.updated += 1,
            Upsert::Failed(_) => self.failed += 1,
        }
    }

    /// Already-installed plugins count as updated.
    pub fn record_install(&mut self, outcome: &Install) {
        match outcome {
            Install::Installed => self.created += 1,
            Install::AlreadyInstalled => self.updated += 1,
            Install::Failed(_) => self.failed += 1,
        }
    }

    pub fn record_trigger(&mut self, outcome: &Trigger) {
        match outcome {
            Trigger::Queued(_) => self.created += 1,
            Trigger::Failed(_) => self.failed += 1,
        }
    }

    pub fn skip(&mut self) {
        self.skipped += 1;
    }
}

impl fmt::Display for KindTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} failed",
            self.created, self.updated, self.failed
        )?;
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        Ok(())
    }
}

/// Restore outcome per kind. Builds count triggers (`created`) only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreReport {
    pub jobs: KindTally,
    pub builds: KindTally,
    pub views: KindTally,
    pub plugins: KindTally,
    pub nodes: KindTally,
    pub elapsed: Duration,
}

impl RestoreReport {
    pub fn failures(&self) -> usize {
        self.jobs.failed + self.builds.failed + self.views.failed + self.plugins.failed + self.nodes.failed
    }
}

impl fmt::Display for RestoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "jobs: {}; builds: {} queued, {} failed; views: {}; plugins: {}; nodes: {}; took {}",
            self.jobs,
            self.builds.created,
            self.builds.failed,
            self.views,
            self.plugins,
            self.nodes,
            format_duration(self.elapsed.as_secs())
        )
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;

    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    format!("{:.2} {}", size, UNITS[unit])
}

/// Format duration as human-readable string
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
