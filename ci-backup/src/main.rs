//! ci-backup - Main entry point
//!
//! Backs up a CI server into a manifest plus config store, or restores one.

use anyhow::{Context, Result};
use ci_backup::config::Config;
use ci_backup::engine::{BackupEngine, BackupOptions, RestoreEngine, RestoreOptions};
use ci_backup::gateway::Gateway;
use ci_backup::server::JenkinsClient;
use ci_backup::store::ConfigStore;
use ci_backup::utils;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// CI server URL
    #[arg(long, env = "JENKINS_URL")]
    url: Option<String>,

    /// CI server user
    #[arg(long, env = "JENKINS_USERNAME")]
    username: Option<String>,

    /// CI server password or API token
    #[arg(long, env = "JENKINS_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Back up the server (default)
    #[arg(long, conflicts_with = "restore")]
    backup: bool,

    /// Restore the server from a previous backup
    #[arg(long)]
    restore: bool,

    /// Manifest file name inside the data directory
    #[arg(long)]
    file_name: Option<String>,

    /// Index of the oldest build to back up or replay per job (0 = newest only)
    #[arg(long)]
    build_depth: Option<usize>,

    /// Directory holding the manifest and config store
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Backup,
    Restore,
}

impl Args {
    fn mode(&self) -> Mode {
        if self.restore {
            Mode::Restore
        } else {
            Mode::Backup
        }
    }

    /// Override file configuration with flags and environment.
    fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.url {
            config.server.url = url.clone();
        }
        if let Some(username) = &self.username {
            config.server.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            config.server.password = Some(password.clone());
        }
        if let Some(file_name) = &self.file_name {
            config.backup.file_name = file_name.clone();
        }
        if let Some(depth) = self.build_depth {
            config.backup.build_depth = depth;
        }
        if let Some(data_dir) = &self.data_dir {
            config.backup.data_dir = data_dir.clone();
        }
        if let Some(level) = &self.log_level {
            config.log.level = level.clone();
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Config::default(),
    };
    args.apply(&mut config);

    // Initialize logging
    utils::logger::init(&config.log.level)?;

    let mode = args.mode();
    tracing::info!(
        "Starting ci-backup v{} ({:?} of {})",
        env!("CARGO_PKG_VERSION"),
        mode,
        config.server.url
    );

    let client = JenkinsClient::connect(&config)
        .await
        .context("connect failed")?;
    let store = ConfigStore::new(&config.backup.data_dir);
    let gateway = Gateway::connect(client, store)
        .await
        .context("connect failed")?;

    match mode {
        Mode::Backup => {
            let options = BackupOptions {
                build_depth: config.backup.build_depth,
                manifest_path: config.manifest_path(),
                source_url: Some(config.server.url.clone()),
            };
            BackupEngine::new(&gateway, options)
                .run_backup()
                .await
                .context("backup failed")?;
            tracing::info!("CI server data saved successfully");
        }
        Mode::Restore => {
            let options = RestoreOptions {
                build_depth: config.backup.build_depth,
                manifest_path: config.manifest_path(),
            };
            let report = RestoreEngine::new(&gateway, options)
                .run_restore()
                .await
                .context("restore failed")?;
            if report.failures() == 0 {
                tracing::info!("CI server data restored successfully");
            }
        }
    }

    Ok(())
}
