//! Snapshot of a CI server's object graph, persisted as the manifest JSON.
//!
//! XML configurations are not part of the manifest; they live in the
//! [`ConfigStore`](crate::store::ConfigStore) keyed by kind and name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::server::{
    Artifact, BuildInfo, BuildRef, ChangeItem, JobSummary, Metadata, NodeSummary, PluginInfo,
    TestReport, ViewSummary,
};
use crate::store::write_atomic;
use crate::utils::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(default)]
    pub jobs: Vec<JobRecord>,
    #[serde(default)]
    pub views: Vec<ViewRecord>,
    #[serde(default)]
    pub plugins: Vec<PluginRecord>,
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub name: String,
    /// Newest first, as the server lists them.
    #[serde(default)]
    pub builds: Vec<BuildRecord>,
    #[serde(flatten)]
    pub extra: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub number: u64,
    #[serde(default)]
    pub info: BuildInfo,
    #[serde(default)]
    pub console_output: String,
    #[serde(default)]
    pub test_report: TestReport,
    #[serde(default)]
    pub changeset: Vec<ChangeItem>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(flatten)]
    pub extra: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewRecord {
    pub name: String,
    #[serde(flatten)]
    pub extra: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    #[serde(default)]
    pub offline: bool,
    #[serde(flatten)]
    pub extra: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginRecord {
    pub short_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(flatten)]
    pub extra: Metadata,
}

/// A name that appears more than once in one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    pub collection: &'static str,
    pub name: String,
}

impl From<JobSummary> for JobRecord {
    fn from(job: JobSummary) -> Self {
        Self {
            name: job.name,
            builds: Vec::new(),
            extra: job.extra,
        }
    }
}

impl From<BuildRef> for BuildRecord {
    fn from(build: BuildRef) -> Self {
        Self {
            number: build.number,
            info: BuildInfo {
                number: build.number,
                ..Default::default()
            },
            extra: build.extra,
            ..Default::default()
        }
    }
}

impl From<ViewSummary> for ViewRecord {
    fn from(view: ViewSummary) -> Self {
        Self {
            name: view.name,
            extra: view.extra,
        }
    }
}

impl From<NodeSummary> for NodeRecord {
    fn from(node: NodeSummary) -> Self {
        Self {
            name: node.name,
            offline: node.offline,
            extra: node.extra,
        }
    }
}

impl From<PluginInfo> for PluginRecord {
    fn from(plugin: PluginInfo) -> Self {
        let mut extra = plugin.extra;
        if let Some(long_name) = plugin.long_name {
            extra.insert("longName".to_string(), long_name.into());
        }
        Self {
            short_name: plugin.short_name,
            version: plugin.version,
            extra,
        }
    }
}

impl Snapshot {
    /// Load a manifest. A missing or unparsable file is a [`Error::Manifest`].
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path)
            .map_err(|e| Error::Manifest(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_slice(&raw)
            .map_err(|e| Error::Manifest(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Atomically write the manifest, returning its size in bytes.
    pub fn save(&self, path: &Path) -> Result<u64> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &json)?;
        Ok(json.len() as u64)
    }

    /// First repeated name of each collection, in collection order.
    pub fn duplicates(&self) -> Vec<Duplicate> {
        let mut found = Vec::new();
        let collections: [(&'static str, Vec<&str>); 4] = [
            ("jobs", self.jobs.iter().map(|j| j.name.as_str()).collect()),
            ("views", self.views.iter().map(|v| v.name.as_str()).collect()),
            (
                "plugins",
                self.plugins.iter().map(|p| p.short_name.as_str()).collect(),
            ),
            ("nodes", self.nodes.iter().map(|n| n.name.as_str()).collect()),
        ];

        for (collection, names) in collections {
            let mut seen = HashSet::new();
            if let Some(name) = names.into_iter().find(|name| !seen.insert(*name)) {
                found.push(Duplicate {
                    collection,
                    name: name.to_string(),
                });
            }
        }
        found
    }

    /// Reject snapshots whose collections repeat a name.
    pub fn validate(&self) -> Result<()> {
        match self.duplicates().first() {
            None => Ok(()),
            Some(dup) => Err(Error::Manifest(format!(
                "duplicate name '{}' in {}",
                dup.name, dup.collection
            ))),
        }
    }

    pub fn build_count(&self) -> usize {
        self.jobs.iter().map(|j| j.builds.len()).sum()
    }
}
