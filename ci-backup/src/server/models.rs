//! Typed records for the CI server's JSON payloads.
//!
//! The server returns loosely shaped objects; the fields the tool relies on
//! are typed and everything else is kept in a flattened `extra` map so it
//! survives a backup untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type Metadata = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(flatten)]
    pub extra: Metadata,
}

impl Identity {
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or("anonymous")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub name: String,
    #[serde(flatten)]
    pub extra: Metadata,
}

/// Entry of a job's build list: number plus whatever else the server sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRef {
    pub number: u64,
    #[serde(flatten)]
    pub extra: Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LastBuild {
    Last,
    #[default]
    Completed,
    Failed,
    Stable,
    Successful,
    Unstable,
    Unsuccessful,
}

impl LastBuild {
    /// Field name in the job info payload.
    pub fn field(self) -> &'static str {
        match self {
            LastBuild::Last => "lastBuild",
            LastBuild::Completed => "lastCompletedBuild",
            LastBuild::Failed => "lastFailedBuild",
            LastBuild::Stable => "lastStableBuild",
            LastBuild::Successful => "lastSuccessfulBuild",
            LastBuild::Unstable => "lastUnstableBuild",
            LastBuild::Unsuccessful => "lastUnsuccessfulBuild",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub builds: Vec<BuildRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_build_number: Option<u64>,
    #[serde(flatten)]
    pub extra: Metadata,
}

impl JobInfo {
    /// Number of the requested last build, if the job has one.
    pub fn last_build_number(&self, which: LastBuild) -> Option<u64> {
        self.extra
            .get(which.field())
            .and_then(|build| build.get("number"))
            .and_then(Value::as_u64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    #[serde(default)]
    pub number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default)]
    pub building: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Value>,
    #[serde(flatten)]
    pub extra: Metadata,
}

impl BuildInfo {
    /// Build parameters recorded in the build's parameter actions, in order.
    pub fn parameters(&self) -> Vec<(String, String)> {
        self.actions
            .iter()
            .filter_map(|action| action.get("parameters").and_then(Value::as_array))
            .flatten()
            .filter_map(|param| {
                let name = param.get("name")?.as_str()?.to_string();
                let value = match param.get("value") {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                Some((name, value))
            })
            .collect()
    }

    /// Change items of the build. Pipeline builds report one change set per
    /// SCM under `changeSets`; freestyle builds a single `changeSet`.
    pub fn change_items(&self) -> Vec<ChangeItem> {
        let single = self.extra.get("changeSet").into_iter();
        let multi = self
            .extra
            .get("changeSets")
            .and_then(Value::as_array)
            .into_iter()
            .flatten();

        single
            .chain(multi)
            .filter_map(|set| set.get("items").and_then(Value::as_array))
            .flatten()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect()
    }

    pub fn artifacts(&self) -> Vec<Artifact> {
        self.extra
            .get("artifacts")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(flatten)]
    pub extra: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub relative_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_path: Option<String>,
    #[serde(flatten)]
    pub extra: Metadata,
}

/// Test report of a build. An absent report is the empty object `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(flatten)]
    pub extra: Metadata,
}

impl TestReport {
    pub fn is_empty(&self) -> bool {
        self.fail_count.is_none()
            && self.pass_count.is_none()
            && self.skip_count.is_none()
            && self.duration.is_none()
            && self.extra.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSummary {
    pub name: String,
    #[serde(flatten)]
    pub extra: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfo {
    pub short_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_name: Option<String>,
    #[serde(flatten)]
    pub extra: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub name: String,
    #[serde(default)]
    pub offline: bool,
    #[serde(flatten)]
    pub extra: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub offline: bool,
    #[serde(flatten)]
    pub extra: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionSummary {
    pub name: String,
    #[serde(flatten)]
    pub extra: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why: Option<String>,
    #[serde(flatten)]
    pub extra: Metadata,
}
