//! HTTP client for the Jenkins REST API.
//!
//! Maps every [`CiServer`] capability onto the server's JSON/XML endpoints
//! and classifies failures into [`Fault`]s.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::models::*;
use super::{CiServer, Fault, FaultKind, FaultResult};
use crate::config::Config;
use crate::utils::Result;

const NODE_TYPE: &str = "hudson.slaves.DumbSlave$DescriptorImpl";
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Clone)]
struct Crumb {
    field: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CrumbResponse {
    crumb: String,
    crumb_request_field: String,
}

#[derive(Deserialize)]
struct JobList {
    #[serde(default)]
    jobs: Vec<JobSummary>,
}

#[derive(Deserialize)]
struct ViewList {
    #[serde(default)]
    views: Vec<ViewSummary>,
}

#[derive(Deserialize)]
struct PluginList {
    #[serde(default)]
    plugins: Vec<PluginInfo>,
}

#[derive(Deserialize)]
struct ComputerList {
    #[serde(default)]
    computer: Vec<NodeInfo>,
}

#[derive(Deserialize)]
struct PromotionList {
    #[serde(default)]
    processes: Vec<PromotionSummary>,
}

#[derive(Deserialize)]
struct QueueList {
    #[serde(default)]
    items: Vec<QueueItem>,
}

pub struct JenkinsClient {
    client: Client,
    base_url: String,
    auth: Option<(String, String)>,
    crumb: Option<Crumb>,
}

impl JenkinsClient {
    pub fn new(base_url: &str, auth: Option<(&str, &str)>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth: auth.map(|(user, pass)| (user.to_string(), pass.to_string())),
            crumb: None,
        })
    }

    /// Build a client from configuration and fetch the CSRF crumb.
    pub async fn connect(config: &Config) -> Result<Self> {
        let mut client = Self::new(&config.server.url, config.credentials(), config.timeout())?;
        client.load_crumb().await;
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Servers without CSRF protection answer 404 here; that is not an error.
    async fn load_crumb(&mut self) {
        match self.get_json::<CrumbResponse>("/crumbIssuer/api/json").await {
            Ok(resp) => {
                debug!("Using CSRF crumb header {}", resp.crumb_request_field);
                self.crumb = Some(Crumb {
                    field: resp.crumb_request_field,
                    value: resp.crumb,
                });
            }
            Err(fault) if fault.is_not_found() => debug!("Server issues no CSRF crumb"),
            Err(fault) => warn!("Could not fetch CSRF crumb: {}", fault),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let is_post = method == Method::POST;
        let mut req = self.client.request(method, format!("{}{}", self.base_url, path));
        if let Some((user, pass)) = &self.auth {
            req = req.basic_auth(user, Some(pass));
        }
        if is_post {
            if let Some(crumb) = &self.crumb {
                req = req.header(crumb.field.as_str(), crumb.value.as_str());
            }
        }
        req
    }

    async fn send(&self, req: RequestBuilder) -> FaultResult<Response> {
        let resp = req.send().await.map_err(fault_from_reqwest)?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let x_error = resp
            .headers()
            .get("X-Error")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.text().await.unwrap_or_default();
        Err(fault_from_status(status.as_u16(), x_error.as_deref(), &body))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> FaultResult<T> {
        let resp = self.send(self.request(Method::GET, path)).await?;
        resp.json::<T>()
            .await
            .map_err(|e| Fault::unknown(format!("invalid response from {}: {}", path, e)))
    }

    async fn get_text(&self, path: &str) -> FaultResult<String> {
        let resp = self.send(self.request(Method::GET, path)).await?;
        resp.text().await.map_err(fault_from_reqwest)
    }

    async fn post(&self, path: &str) -> FaultResult<Response> {
        self.send(self.request(Method::POST, path)).await
    }

    async fn post_xml(&self, path: &str, query: &[(&str, &str)], xml: &str) -> FaultResult<()> {
        let req = self
            .request(Method::POST, path)
            .query(query)
            .header(CONTENT_TYPE, "application/xml; charset=utf-8")
            .body(xml.to_string());
        self.send(req).await?;
        Ok(())
    }

    /// `Ok(false)` on 404, any other fault is passed on.
    async fn exists(&self, path: &str) -> FaultResult<bool> {
        match self.send(self.request(Method::GET, path)).await {
            Ok(_) => Ok(true),
            Err(fault) if fault.is_not_found() => Ok(false),
            Err(fault) => Err(fault),
        }
    }
}

#[async_trait]
impl CiServer for JenkinsClient {
    async fn whoami(&self) -> FaultResult<Identity> {
        self.get_json("/me/api/json?depth=0").await
    }

    async fn get_jobs(&self) -> FaultResult<Vec<JobSummary>> {
        let list: JobList = self.get_json("/api/json?tree=jobs[name,url,color]").await?;
        Ok(list.jobs)
    }

    async fn get_job_info(&self, name: &str) -> FaultResult<JobInfo> {
        self.get_json(&format!("{}/api/json?depth=0", job_path(name))).await
    }

    async fn get_job_config(&self, name: &str) -> FaultResult<String> {
        self.get_text(&format!("{}/config.xml", job_path(name))).await
    }

    /// Jenkins answers a duplicate create with a 400 error page, so
    /// existence is checked first.
    async fn create_job(&self, name: &str, config_xml: &str) -> FaultResult<()> {
        if self.exists(&format!("{}/api/json?tree=name", job_path(name))).await? {
            return Err(Fault::conflict(format!("job[{}] already exists", name)));
        }
        let (parent, leaf) = split_parent(name);
        let path = format!("{}/createItem", job_path(parent));
        self.post_xml(&path, &[("name", leaf)], config_xml).await
    }

    async fn reconfig_job(&self, name: &str, config_xml: &str) -> FaultResult<()> {
        self.post_xml(&format!("{}/config.xml", job_path(name)), &[], config_xml)
            .await
    }

    async fn copy_job(&self, from: &str, to: &str) -> FaultResult<()> {
        let (parent, leaf) = split_parent(to);
        let path = format!("{}/createItem", job_path(parent));
        let req = self
            .request(Method::POST, &path)
            .query(&[("name", leaf), ("mode", "copy"), ("from", from)]);
        self.send(req).await?;
        Ok(())
    }

    async fn delete_job(&self, name: &str) -> FaultResult<()> {
        self.post(&format!("{}/doDelete", job_path(name))).await?;
        Ok(())
    }

    async fn enable_job(&self, name: &str) -> FaultResult<()> {
        self.post(&format!("{}/enable", job_path(name))).await?;
        Ok(())
    }

    async fn disable_job(&self, name: &str) -> FaultResult<()> {
        self.post(&format!("{}/disable", job_path(name))).await?;
        Ok(())
    }

    async fn build_job(&self, name: &str, parameters: &[(String, String)]) -> FaultResult<Option<u64>> {
        let req = if parameters.is_empty() {
            self.request(Method::POST, &format!("{}/build", job_path(name)))
        } else {
            self.request(Method::POST, &format!("{}/buildWithParameters", job_path(name)))
                .query(parameters)
        };
        let resp = self.send(req).await?;

        Ok(resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(queue_id_from_location))
    }

    async fn set_next_build_number(&self, name: &str, number: u64) -> FaultResult<()> {
        let req = self
            .request(Method::POST, &format!("{}/nextbuildnumber/submit", job_path(name)))
            .form(&[("nextBuildNumber", number.to_string())]);
        self.send(req).await?;
        Ok(())
    }

    async fn get_build_info(&self, name: &str, number: u64) -> FaultResult<BuildInfo> {
        self.get_json(&format!("{}/{}/api/json?depth=0", job_path(name), number))
            .await
    }

    async fn get_build_console_output(&self, name: &str, number: u64) -> FaultResult<String> {
        self.get_text(&format!("{}/{}/consoleText", job_path(name), number))
            .await
    }

    async fn get_build_test_report(&self, name: &str, number: u64) -> FaultResult<TestReport> {
        self.get_json(&format!("{}/{}/testReport/api/json?depth=0", job_path(name), number))
            .await
    }

    async fn get_build_stages(&self, name: &str, number: u64) -> FaultResult<Metadata> {
        self.get_json(&format!("{}/{}/wfapi/describe", job_path(name), number))
            .await
    }

    async fn get_views(&self) -> FaultResult<Vec<ViewSummary>> {
        let list: ViewList = self.get_json("/api/json?tree=views[name,url]").await?;
        Ok(list.views)
    }

    async fn view_exists(&self, name: &str) -> FaultResult<bool> {
        self.exists(&format!("/view/{}/api/json?tree=name", encode_segment(name)))
            .await
    }

    async fn get_jobs_by_view(&self, name: &str) -> FaultResult<Vec<JobSummary>> {
        let list: JobList = self
            .get_json(&format!(
                "/view/{}/api/json?tree=jobs[name,url,color]",
                encode_segment(name)
            ))
            .await?;
        Ok(list.jobs)
    }

    async fn get_view_config(&self, name: &str) -> FaultResult<String> {
        self.get_text(&format!("/view/{}/config.xml", encode_segment(name)))
            .await
    }

    async fn create_view(&self, name: &str, config_xml: &str) -> FaultResult<()> {
        if self.view_exists(name).await? {
            return Err(Fault::conflict(format!("view[{}] already exists", name)));
        }
        self.post_xml("/createView", &[("name", name)], config_xml).await
    }

    async fn reconfig_view(&self, name: &str, config_xml: &str) -> FaultResult<()> {
        self.post_xml(&format!("/view/{}/config.xml", encode_segment(name)), &[], config_xml)
            .await
    }

    async fn delete_view(&self, name: &str) -> FaultResult<()> {
        self.post(&format!("/view/{}/doDelete", encode_segment(name)))
            .await?;
        Ok(())
    }

    async fn get_plugins(&self) -> FaultResult<Vec<PluginInfo>> {
        let list: PluginList = self.get_json("/pluginManager/api/json?depth=2").await?;
        Ok(list.plugins)
    }

    async fn get_plugin_info(&self, name: &str) -> FaultResult<PluginInfo> {
        self.get_plugins()
            .await?
            .into_iter()
            .find(|p| p.short_name == name || p.long_name.as_deref() == Some(name))
            .ok_or_else(|| Fault::not_found(format!("plugin[{}] does not exist", name)))
    }

    async fn install_plugin(&self, name: &str) -> FaultResult<()> {
        match self.get_plugin_info(name).await {
            Ok(_) => return Err(Fault::conflict(format!("plugin[{}] already exists", name))),
            Err(fault) if fault.is_not_found() => {}
            Err(fault) => return Err(fault),
        }

        let body = format!(
            "<jenkins><install plugin=\"{}@latest\" /></jenkins>",
            escape_xml_attr(name)
        );
        self.post_xml("/pluginManager/installNecessaryPlugins", &[], &body)
            .await
    }

    async fn get_nodes(&self) -> FaultResult<Vec<NodeSummary>> {
        let list: ComputerList = self.get_json("/computer/api/json?depth=0").await?;
        Ok(list
            .computer
            .into_iter()
            .map(|c| NodeSummary {
                name: c.display_name,
                offline: c.offline,
                extra: c.extra,
            })
            .collect())
    }

    async fn get_node_info(&self, name: &str) -> FaultResult<NodeInfo> {
        self.get_json(&format!("{}/api/json?depth=0", node_path(name)))
            .await
    }

    async fn get_node_config(&self, name: &str) -> FaultResult<String> {
        self.get_text(&format!("{}/config.xml", node_path(name))).await
    }

    async fn create_node(&self, name: &str, config_xml: &str) -> FaultResult<()> {
        if self.exists(&format!("{}/api/json?tree=displayName", node_path(name))).await? {
            return Err(Fault::conflict(format!("node[{}] already exists", name)));
        }

        let inner = serde_json::json!({
            "name": name,
            "nodeDescription": "",
            "numExecutors": 1,
            "remoteFS": "/var/lib/jenkins",
            "labelString": "",
            "mode": "NORMAL",
            "type": NODE_TYPE,
            "retentionStrategy": {"stapler-class": "hudson.slaves.RetentionStrategy$Always"},
            "nodeProperties": {"stapler-class-bag": "true"},
            "launcher": {"stapler-class": "hudson.slaves.JNLPLauncher"},
        });
        let req = self.request(Method::POST, "/computer/doCreateItem").form(&[
            ("name", name.to_string()),
            ("type", NODE_TYPE.to_string()),
            ("json", inner.to_string()),
        ]);
        self.send(req).await?;

        // The create form only takes a skeleton; the saved config carries the rest.
        self.reconfig_node(name, config_xml).await
    }

    async fn reconfig_node(&self, name: &str, config_xml: &str) -> FaultResult<()> {
        self.post_xml(&format!("{}/config.xml", node_path(name)), &[], config_xml)
            .await
    }

    async fn delete_node(&self, name: &str) -> FaultResult<()> {
        self.post(&format!("{}/doDelete", node_path(name))).await?;
        Ok(())
    }

    async fn enable_node(&self, name: &str) -> FaultResult<()> {
        if !self.get_node_info(name).await?.offline {
            return Ok(());
        }
        let req = self
            .request(Method::POST, &format!("{}/toggleOffline", node_path(name)))
            .query(&[("offlineMessage", "")]);
        self.send(req).await?;
        Ok(())
    }

    async fn disable_node(&self, name: &str, message: &str) -> FaultResult<()> {
        if self.get_node_info(name).await?.offline {
            return Ok(());
        }
        let req = self
            .request(Method::POST, &format!("{}/toggleOffline", node_path(name)))
            .query(&[("offlineMessage", message)]);
        self.send(req).await?;
        Ok(())
    }

    async fn get_promotions(&self, job: &str) -> FaultResult<Vec<PromotionSummary>> {
        let list: PromotionList = self
            .get_json(&format!("{}/promotion/api/json?depth=0", job_path(job)))
            .await?;
        Ok(list.processes)
    }

    async fn promotion_exists(&self, job: &str, promotion: &str) -> FaultResult<bool> {
        self.exists(&format!("{}/api/json?tree=name", promotion_path(job, promotion)))
            .await
    }

    async fn get_promotion_config(&self, job: &str, promotion: &str) -> FaultResult<String> {
        self.get_text(&format!("{}/config.xml", promotion_path(job, promotion)))
            .await
    }

    async fn create_promotion(&self, job: &str, promotion: &str, config_xml: &str) -> FaultResult<()> {
        if self.promotion_exists(job, promotion).await? {
            return Err(Fault::conflict(format!(
                "promotion[{}] already exists at job[{}]",
                promotion, job
            )));
        }
        let path = format!("{}/promotion/createProcess", job_path(job));
        self.post_xml(&path, &[("name", promotion)], config_xml).await
    }

    async fn reconfig_promotion(&self, job: &str, promotion: &str, config_xml: &str) -> FaultResult<()> {
        let path = format!("{}/config.xml", promotion_path(job, promotion));
        self.post_xml(&path, &[], config_xml).await
    }

    async fn delete_promotion(&self, job: &str, promotion: &str) -> FaultResult<()> {
        self.post(&format!("{}/doDelete", promotion_path(job, promotion)))
            .await?;
        Ok(())
    }

    async fn get_queue_info(&self) -> FaultResult<Vec<QueueItem>> {
        let list: QueueList = self.get_json("/queue/api/json?depth=0").await?;
        Ok(list.items)
    }

    async fn cancel_queue_item(&self, id: u64) -> FaultResult<()> {
        let req = self
            .request(Method::POST, "/queue/cancelItem")
            .query(&[("id", id.to_string())]);
        self.send(req).await?;
        Ok(())
    }
}

pub(crate) fn fault_from_reqwest(e: reqwest::Error) -> Fault {
    let kind = if e.is_timeout() || e.is_connect() {
        FaultKind::Transient
    } else if e.status().map(|s| s.as_u16()) == Some(404) {
        FaultKind::NotFound
    } else {
        FaultKind::Unknown
    };
    Fault::new(kind, e.to_string())
}

/// The full body is classified; only the message is truncated.
pub(crate) fn fault_from_status(status: u16, x_error: Option<&str>, body: &str) -> Fault {
    let reason = match x_error {
        Some(reason) if !reason.is_empty() => reason,
        _ => body.trim(),
    };
    let already_exists = reason.to_lowercase().contains("already exists");
    let detail: String = if already_exists {
        already_exists_line(reason)
    } else {
        reason.chars().take(MAX_ERROR_BODY).collect()
    };
    let message = format!("HTTP {}: {}", status, detail);

    let kind = match status {
        404 => FaultKind::NotFound,
        409 => FaultKind::Conflict,
        400 if already_exists => FaultKind::Conflict,
        408 | 429 | 500..=599 => FaultKind::Transient,
        _ => FaultKind::Unknown,
    };
    Fault::new(kind, message)
}

/// The "already exists" sentence of an error page, with markup stripped.
fn already_exists_line(text: &str) -> String {
    let mut plain = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => {
                in_tag = true;
                plain.push('\n');
            }
            '>' => in_tag = false,
            c if !in_tag => plain.push(c),
            _ => {}
        }
    }
    plain
        .lines()
        .map(str::trim)
        .find(|line| line.to_lowercase().contains("already exists"))
        .unwrap_or_default()
        .chars()
        .take(MAX_ERROR_BODY)
        .collect()
}

/// `team/app` becomes `/job/team/job/app`; the empty name is the server root.
pub(crate) fn job_path(name: &str) -> String {
    name.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| format!("/job/{}", encode_segment(segment)))
        .collect()
}

fn node_path(name: &str) -> String {
    let segment = match name {
        "master" => "(master)".to_string(),
        "Built-In Node" => "(built-in)".to_string(),
        other => encode_segment(other),
    };
    format!("/computer/{}", segment)
}

fn promotion_path(job: &str, promotion: &str) -> String {
    format!(
        "{}/promotion/process/{}",
        job_path(job),
        encode_segment(promotion)
    )
}

fn split_parent(name: &str) -> (&str, &str) {
    name.trim_matches('/').rsplit_once('/').unwrap_or(("", name.trim_matches('/')))
}

fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn escape_xml_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// `http://ci/queue/item/42/` → 42
fn queue_id_from_location(location: &str) -> Option<u64> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|id| id.parse().ok())
}
