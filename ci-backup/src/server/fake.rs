//! In-memory CI server used by gateway and engine tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::models::*;
use super::{CiServer, Fault, FaultResult};

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeBuild {
    pub number: u64,
    pub info: BuildInfo,
    pub console: String,
    pub test_report: Option<TestReport>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeJob {
    pub name: String,
    pub config: String,
    pub enabled: bool,
    /// Newest first, like the real build list.
    pub builds: Vec<FakeBuild>,
    pub next_build_number: u64,
}

#[derive(Debug, Default)]
pub(crate) struct FakeState {
    pub jobs: Vec<FakeJob>,
    pub views: Vec<(String, String)>,
    pub nodes: Vec<(String, String, bool)>,
    pub plugins: Vec<PluginInfo>,
    pub promotions: Vec<(String, String, String)>,
    pub queue: Vec<QueueItem>,
    /// Every mutating call as `"<op> <name>"`, in order.
    pub calls: Vec<String>,
    /// Build triggers as `(job, parameters)`.
    pub triggered: Vec<(String, Vec<(String, String)>)>,
    /// Faults to return, keyed by `"<op> <name>"`.
    pub failures: HashMap<String, Fault>,
    /// Number of read calls, by op.
    pub reads: HashMap<String, usize>,
}

#[derive(Debug, Default)]
pub(crate) struct FakeServer {
    state: Mutex<FakeState>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn with_job(self, name: &str, config: &str, build_numbers: &[u64]) -> Self {
        {
            let mut state = self.state();
            let builds = build_numbers
                .iter()
                .map(|&number| FakeBuild {
                    number,
                    info: BuildInfo {
                        number,
                        result: Some("SUCCESS".to_string()),
                        ..Default::default()
                    },
                    console: format!("build {} output", number),
                    test_report: None,
                })
                .collect();
            let next = build_numbers.iter().max().copied().unwrap_or(0) + 1;
            state.jobs.push(FakeJob {
                name: name.to_string(),
                config: config.to_string(),
                enabled: true,
                builds,
                next_build_number: next,
            });
        }
        self
    }

    pub fn with_view(self, name: &str, config: &str) -> Self {
        self.state().views.push((name.to_string(), config.to_string()));
        self
    }

    pub fn with_node(self, name: &str, config: &str) -> Self {
        self.state()
            .nodes
            .push((name.to_string(), config.to_string(), false));
        self
    }

    pub fn with_plugin(self, short_name: &str, version: &str) -> Self {
        self.state().plugins.push(PluginInfo {
            short_name: short_name.to_string(),
            version: version.to_string(),
            long_name: Some(format!("{} plugin", short_name)),
            extra: Metadata::new(),
        });
        self
    }

    /// Make `op` on `name` fail with `fault`.
    pub fn fail(self, op: &str, name: &str, fault: Fault) -> Self {
        self.state().failures.insert(format!("{} {}", op, name), fault);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn reads(&self, op: &str) -> usize {
        self.state().reads.get(op).copied().unwrap_or(0)
    }

    pub fn job_config(&self, name: &str) -> Option<String> {
        self.state()
            .jobs
            .iter()
            .find(|j| j.name == name)
            .map(|j| j.config.clone())
    }

    pub fn job_names(&self) -> Vec<String> {
        self.state().jobs.iter().map(|j| j.name.clone()).collect()
    }

    pub fn view_names(&self) -> Vec<String> {
        self.state().views.iter().map(|v| v.0.clone()).collect()
    }

    pub fn node_names(&self) -> Vec<String> {
        self.state().nodes.iter().map(|n| n.0.clone()).collect()
    }

    fn read(&self, op: &str, name: &str) -> FaultResult<MutexGuard<'_, FakeState>> {
        let mut state = self.state();
        *state.reads.entry(op.to_string()).or_default() += 1;
        if let Some(fault) = state.failures.get(&format!("{} {}", op, name)).cloned() {
            return Err(fault);
        }
        Ok(state)
    }

    fn write(&self, op: &str, name: &str) -> FaultResult<MutexGuard<'_, FakeState>> {
        let mut state = self.state();
        state.calls.push(format!("{} {}", op, name));
        if let Some(fault) = state.failures.get(&format!("{} {}", op, name)).cloned() {
            return Err(fault);
        }
        Ok(state)
    }
}

fn missing(what: &str, name: &str) -> Fault {
    Fault::not_found(format!("{}[{}] does not exist", what, name))
}

fn exists(what: &str, name: &str) -> Fault {
    Fault::unknown(format!("{}[{}] already exists", what, name))
}

fn find_job<'a>(state: &'a mut FakeState, name: &str) -> FaultResult<&'a mut FakeJob> {
    state
        .jobs
        .iter_mut()
        .find(|j| j.name == name)
        .ok_or_else(|| missing("job", name))
}

fn find_build<'a>(state: &'a mut FakeState, name: &str, number: u64) -> FaultResult<&'a FakeBuild> {
    find_job(state, name)?
        .builds
        .iter()
        .find(|b| b.number == number)
        .ok_or_else(|| missing("build", &format!("{}#{}", name, number)))
}

#[async_trait]
impl CiServer for FakeServer {
    async fn whoami(&self) -> FaultResult<Identity> {
        self.read("whoami", "")?;
        Ok(Identity {
            id: Some("admin".to_string()),
            full_name: Some("Administrator".to_string()),
            extra: Metadata::new(),
        })
    }

    async fn get_jobs(&self) -> FaultResult<Vec<JobSummary>> {
        let state = self.read("get_jobs", "")?;
        Ok(state
            .jobs
            .iter()
            .map(|j| {
                let mut extra = Metadata::new();
                extra.insert("color".to_string(), "blue".into());
                JobSummary {
                    name: j.name.clone(),
                    extra,
                }
            })
            .collect())
    }

    async fn get_job_info(&self, name: &str) -> FaultResult<JobInfo> {
        let mut state = self.read("get_job_info", name)?;
        let job = find_job(&mut state, name)?;
        let mut extra = Metadata::new();
        if let Some(last) = job.builds.first() {
            extra.insert(
                "lastCompletedBuild".to_string(),
                serde_json::json!({ "number": last.number }),
            );
        }
        Ok(JobInfo {
            name: job.name.clone(),
            builds: job
                .builds
                .iter()
                .map(|b| BuildRef {
                    number: b.number,
                    extra: Metadata::new(),
                })
                .collect(),
            next_build_number: Some(job.next_build_number),
            extra,
        })
    }

    async fn get_job_config(&self, name: &str) -> FaultResult<String> {
        let mut state = self.read("get_job_config", name)?;
        Ok(find_job(&mut state, name)?.config.clone())
    }

    async fn create_job(&self, name: &str, config_xml: &str) -> FaultResult<()> {
        let mut state = self.write("create_job", name)?;
        if state.jobs.iter().any(|j| j.name == name) {
            return Err(exists("job", name));
        }
        state.jobs.push(FakeJob {
            name: name.to_string(),
            config: config_xml.to_string(),
            enabled: true,
            builds: Vec::new(),
            next_build_number: 1,
        });
        Ok(())
    }

    async fn reconfig_job(&self, name: &str, config_xml: &str) -> FaultResult<()> {
        let mut state = self.write("reconfig_job", name)?;
        find_job(&mut state, name)?.config = config_xml.to_string();
        Ok(())
    }

    async fn copy_job(&self, from: &str, to: &str) -> FaultResult<()> {
        let mut state = self.write("copy_job", to)?;
        let config = find_job(&mut state, from)?.config.clone();
        if state.jobs.iter().any(|j| j.name == to) {
            return Err(exists("job", to));
        }
        state.jobs.push(FakeJob {
            name: to.to_string(),
            config,
            enabled: true,
            builds: Vec::new(),
            next_build_number: 1,
        });
        Ok(())
    }

    async fn delete_job(&self, name: &str) -> FaultResult<()> {
        let mut state = self.write("delete_job", name)?;
        find_job(&mut state, name)?;
        state.jobs.retain(|j| j.name != name);
        Ok(())
    }

    async fn enable_job(&self, name: &str) -> FaultResult<()> {
        let mut state = self.write("enable_job", name)?;
        find_job(&mut state, name)?.enabled = true;
        Ok(())
    }

    async fn disable_job(&self, name: &str) -> FaultResult<()> {
        let mut state = self.write("disable_job", name)?;
        find_job(&mut state, name)?.enabled = false;
        Ok(())
    }

    async fn build_job(&self, name: &str, parameters: &[(String, String)]) -> FaultResult<Option<u64>> {
        let mut state = self.write("build_job", name)?;
        let job = find_job(&mut state, name)?;
        let number = job.next_build_number;
        job.next_build_number += 1;
        job.builds.insert(
            0,
            FakeBuild {
                number,
                info: BuildInfo {
                    number,
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        state
            .triggered
            .push((name.to_string(), parameters.to_vec()));
        Ok(Some(number))
    }

    async fn set_next_build_number(&self, name: &str, number: u64) -> FaultResult<()> {
        let mut state = self.write("set_next_build_number", name)?;
        find_job(&mut state, name)?.next_build_number = number;
        Ok(())
    }

    async fn get_build_info(&self, name: &str, number: u64) -> FaultResult<BuildInfo> {
        let mut state = self.read("get_build_info", name)?;
        Ok(find_build(&mut state, name, number)?.info.clone())
    }

    async fn get_build_console_output(&self, name: &str, number: u64) -> FaultResult<String> {
        let mut state = self.read("get_build_console_output", name)?;
        Ok(find_build(&mut state, name, number)?.console.clone())
    }

    async fn get_build_test_report(&self, name: &str, number: u64) -> FaultResult<TestReport> {
        let mut state = self.read("get_build_test_report", name)?;
        find_build(&mut state, name, number)?
            .test_report
            .clone()
            .ok_or_else(|| missing("testReport", name))
    }

    async fn get_build_stages(&self, name: &str, number: u64) -> FaultResult<Metadata> {
        let mut state = self.read("get_build_stages", name)?;
        find_build(&mut state, name, number)?;
        let mut stages = Metadata::new();
        stages.insert("stages".to_string(), serde_json::json!([]));
        Ok(stages)
    }

    async fn get_views(&self) -> FaultResult<Vec<ViewSummary>> {
        let state = self.read("get_views", "")?;
        Ok(state
            .views
            .iter()
            .map(|(name, _)| ViewSummary {
                name: name.clone(),
                extra: Metadata::new(),
            })
            .collect())
    }

    async fn view_exists(&self, name: &str) -> FaultResult<bool> {
        let state = self.read("view_exists", name)?;
        Ok(state.views.iter().any(|v| v.0 == name))
    }

    async fn get_jobs_by_view(&self, name: &str) -> FaultResult<Vec<JobSummary>> {
        let state = self.read("get_jobs_by_view", name)?;
        if !state.views.iter().any(|v| v.0 == name) {
            return Err(missing("view", name));
        }
        Ok(state
            .jobs
            .iter()
            .map(|j| JobSummary {
                name: j.name.clone(),
                extra: Metadata::new(),
            })
            .collect())
    }

    async fn get_view_config(&self, name: &str) -> FaultResult<String> {
        let state = self.read("get_view_config", name)?;
        state
            .views
            .iter()
            .find(|v| v.0 == name)
            .map(|v| v.1.clone())
            .ok_or_else(|| missing("view", name))
    }

    async fn create_view(&self, name: &str, config_xml: &str) -> FaultResult<()> {
        let mut state = self.write("create_view", name)?;
        if state.views.iter().any(|v| v.0 == name) {
            return Err(exists("view", name));
        }
        state.views.push((name.to_string(), config_xml.to_string()));
        Ok(())
    }

    async fn reconfig_view(&self, name: &str, config_xml: &str) -> FaultResult<()> {
        let mut state = self.write("reconfig_view", name)?;
        let view = state
            .views
            .iter_mut()
            .find(|v| v.0 == name)
            .ok_or_else(|| missing("view", name))?;
        view.1 = config_xml.to_string();
        Ok(())
    }

    async fn delete_view(&self, name: &str) -> FaultResult<()> {
        let mut state = self.write("delete_view", name)?;
        state.views.retain(|v| v.0 != name);
        Ok(())
    }

    async fn get_plugins(&self) -> FaultResult<Vec<PluginInfo>> {
        let state = self.read("get_plugins", "")?;
        Ok(state.plugins.clone())
    }

    async fn get_plugin_info(&self, name: &str) -> FaultResult<PluginInfo> {
        let state = self.read("get_plugin_info", name)?;
        state
            .plugins
            .iter()
            .find(|p| p.short_name == name)
            .cloned()
            .ok_or_else(|| missing("plugin", name))
    }

    async fn install_plugin(&self, name: &str) -> FaultResult<()> {
        let mut state = self.write("install_plugin", name)?;
        if state.plugins.iter().any(|p| p.short_name == name) {
            return Err(exists("plugin", name));
        }
        state.plugins.push(PluginInfo {
            short_name: name.to_string(),
            version: "latest".to_string(),
            ..Default::default()
        });
        Ok(())
    }

    async fn get_nodes(&self) -> FaultResult<Vec<NodeSummary>> {
        let state = self.read("get_nodes", "")?;
        Ok(state
            .nodes
            .iter()
            .map(|(name, _, offline)| NodeSummary {
                name: name.clone(),
                offline: *offline,
                extra: Metadata::new(),
            })
            .collect())
    }

    async fn get_node_info(&self, name: &str) -> FaultResult<NodeInfo> {
        let state = self.read("get_node_info", name)?;
        state
            .nodes
            .iter()
            .find(|n| n.0 == name)
            .map(|n| NodeInfo {
                display_name: n.0.clone(),
                offline: n.2,
                extra: Metadata::new(),
            })
            .ok_or_else(|| missing("node", name))
    }

    async fn get_node_config(&self, name: &str) -> FaultResult<String> {
        let state = self.read("get_node_config", name)?;
        state
            .nodes
            .iter()
            .find(|n| n.0 == name)
            .map(|n| n.1.clone())
            .ok_or_else(|| missing("node", name))
    }

    async fn create_node(&self, name: &str, config_xml: &str) -> FaultResult<()> {
        let mut state = self.write("create_node", name)?;
        if state.nodes.iter().any(|n| n.0 == name) {
            return Err(exists("node", name));
        }
        state
            .nodes
            .push((name.to_string(), config_xml.to_string(), false));
        Ok(())
    }

    async fn reconfig_node(&self, name: &str, config_xml: &str) -> FaultResult<()> {
        let mut state = self.write("reconfig_node", name)?;
        let node = state
            .nodes
            .iter_mut()
            .find(|n| n.0 == name)
            .ok_or_else(|| missing("node", name))?;
        node.1 = config_xml.to_string();
        Ok(())
    }

    async fn delete_node(&self, name: &str) -> FaultResult<()> {
        let mut state = self.write("delete_node", name)?;
        state.nodes.retain(|n| n.0 != name);
        Ok(())
    }

    async fn enable_node(&self, name: &str) -> FaultResult<()> {
        let mut state = self.write("enable_node", name)?;
        let node = state
            .nodes
            .iter_mut()
            .find(|n| n.0 == name)
            .ok_or_else(|| missing("node", name))?;
        node.2 = false;
        Ok(())
    }

    async fn disable_node(&self, name: &str, _message: &str) -> FaultResult<()> {
        let mut state = self.write("disable_node", name)?;
        let node = state
            .nodes
            .iter_mut()
            .find(|n| n.0 == name)
            .ok_or_else(|| missing("node", name))?;
        node.2 = true;
        Ok(())
    }

    async fn get_promotions(&self, job: &str) -> FaultResult<Vec<PromotionSummary>> {
        let state = self.read("get_promotions", job)?;
        Ok(state
            .promotions
            .iter()
            .filter(|p| p.0 == job)
            .map(|p| PromotionSummary {
                name: p.1.clone(),
                extra: Metadata::new(),
            })
            .collect())
    }

    async fn promotion_exists(&self, job: &str, promotion: &str) -> FaultResult<bool> {
        let state = self.read("promotion_exists", job)?;
        Ok(state.promotions.iter().any(|p| p.0 == job && p.1 == promotion))
    }

    async fn get_promotion_config(&self, job: &str, promotion: &str) -> FaultResult<String> {
        let state = self.read("get_promotion_config", job)?;
        state
            .promotions
            .iter()
            .find(|p| p.0 == job && p.1 == promotion)
            .map(|p| p.2.clone())
            .ok_or_else(|| missing("promotion", promotion))
    }

    async fn create_promotion(&self, job: &str, promotion: &str, config_xml: &str) -> FaultResult<()> {
        let mut state = self.write("create_promotion", job)?;
        if state.promotions.iter().any(|p| p.0 == job && p.1 == promotion) {
            return Err(exists("promotion", promotion));
        }
        state
            .promotions
            .push((job.to_string(), promotion.to_string(), config_xml.to_string()));
        Ok(())
    }

    async fn reconfig_promotion(&self, job: &str, promotion: &str, config_xml: &str) -> FaultResult<()> {
        let mut state = self.write("reconfig_promotion", job)?;
        let promo = state
            .promotions
            .iter_mut()
            .find(|p| p.0 == job && p.1 == promotion)
            .ok_or_else(|| missing("promotion", promotion))?;
        promo.2 = config_xml.to_string();
        Ok(())
    }

    async fn delete_promotion(&self, job: &str, promotion: &str) -> FaultResult<()> {
        let mut state = self.write("delete_promotion", job)?;
        state.promotions.retain(|p| !(p.0 == job && p.1 == promotion));
        Ok(())
    }

    async fn get_queue_info(&self) -> FaultResult<Vec<QueueItem>> {
        let state = self.read("get_queue_info", "")?;
        Ok(state.queue.clone())
    }

    async fn cancel_queue_item(&self, id: u64) -> FaultResult<()> {
        let mut state = self.write("cancel_queue_item", &id.to_string())?;
        let before = state.queue.len();
        state.queue.retain(|item| item.id != id);
        if state.queue.len() == before {
            return Err(missing("queue item", &id.to_string()));
        }
        Ok(())
    }
}
