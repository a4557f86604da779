//! Typed HTTP client for the nodewatch daemon REST API.

use anyhow::{bail, Context, Result};
use reqwest::Client;

use crate::config::Config;
use crate::domain::monitor_service::{MonitorResults, PollSummary};
use crate::domain::node::Node;
use crate::domain::types::{DaemonHealth, LabelView, NodeDetail};
use crate::monitors::ColumnDescriptor;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:9200";

pub struct NodewatchClient {
    base_url: String,
    http: Client,
}

impl NodewatchClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Resolve the daemon address: explicit `url`, then `daemon_url` from
    /// config, then the configured listen address, then the default.
    pub fn from_config(url: Option<&str>, config: &Config) -> Result<Self> {
        if let Some(url) = url.or(config.daemon_url.as_deref()) {
            return Self::new(url);
        }
        let addr = &config.daemon.http_addr;
        if addr.is_empty() {
            Self::new(DEFAULT_BASE_URL)
        } else {
            Self::new(&format!("http://{}", addr))
        }
    }

    pub async fn health(&self) -> Result<DaemonHealth> {
        self.get("/health").await
    }

    pub async fn nodes(&self) -> Result<Vec<Node>> {
        self.get("/api/v1/nodes").await
    }

    pub async fn node(&self, name: &str) -> Result<NodeDetail> {
        self.get(&format!("/api/v1/nodes/{}", name)).await
    }

    pub async fn labels(&self, name: &str, max: i32, dynamic: bool) -> Result<LabelView> {
        self.get(&format!(
            "/api/v1/nodes/{}/labels?max={}&dynamic={}",
            name, max, dynamic
        ))
        .await
    }

    pub async fn set_enabled(&self, name: &str, enabled: bool) -> Result<Node> {
        let url = format!("{}/api/v1/nodes/{}/enabled", self.base_url, name);
        let resp = self
            .http
            .put(&url)
            .json(&serde_json::json!({ "enabled": enabled }))
            .send()
            .await
            .with_context(|| format!("PUT {}", url))?;

        if !resp.status().is_success() {
            bail!("{} returned {}", url, resp.status());
        }

        resp.json()
            .await
            .with_context(|| format!("parsing response from {}", url))
    }

    pub async fn columns(&self) -> Result<Vec<ColumnDescriptor>> {
        self.get("/api/v1/columns").await
    }

    pub async fn results(&self, monitor_id: &str) -> Result<MonitorResults> {
        self.get(&format!("/api/v1/monitors/{}", monitor_id)).await
    }

    pub async fn poll(&self, monitor_id: Option<&str>) -> Result<Vec<PollSummary>> {
        match monitor_id {
            Some(id) => {
                let summary: PollSummary =
                    self.post(&format!("/api/v1/monitors/{}/poll", id)).await?;
                Ok(vec![summary])
            }
            None => self.post("/api/v1/poll").await,
        }
    }

    // ── Internal helpers ───────────────────────────────────

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {}", url))?;

        if !resp.status().is_success() {
            bail!("{} returned {}", url, resp.status());
        }

        resp.json()
            .await
            .with_context(|| format!("parsing response from {}", url))
    }

    async fn post<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .post(&url)
            .send()
            .await
            .with_context(|| format!("POST {}", url))?;

        if !resp.status().is_success() {
            bail!("{} returned {}", url, resp.status());
        }

        resp.json()
            .await
            .with_context(|| format!("parsing response from {}", url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::rest::{self, AppState};
    use crate::domain::monitor_service::MonitorService;
    use crate::domain::registry::tests::registry_with;
    use crate::monitors::info::{InfoSettings, NodeInfo};
    use crate::monitors::status::NodeStatus;
    use crate::monitors::{MonitorData, NodeMonitor};
    use std::sync::Arc;
    use std::time::Duration;

    async fn serve() -> NodewatchClient {
        let registry = Arc::new(registry_with(&["a", "b"]).await);
        let monitors: Vec<Arc<dyn NodeMonitor>> = vec![
            Arc::new(NodeStatus::new("nodeStatus")),
            Arc::new(NodeInfo::new("nodeInfo", InfoSettings::default())),
        ];
        let svc = Arc::new(MonitorService::new(registry, monitors, Duration::from_secs(5)));
        let app = rest::router(AppState { monitors: svc });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        NodewatchClient::new(&format!("http://{}/", addr)).unwrap()
    }

    #[tokio::test]
    async fn lists_nodes_and_columns() {
        let client = serve().await;

        let health = client.health().await.unwrap();
        assert_eq!(health.nodes, 2);
        assert_eq!(health.online, 2);

        let nodes = client.nodes().await.unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(nodes[0].is_online());

        let columns = client.columns().await.unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Status", "Node"]);
    }

    #[tokio::test]
    async fn results_appear_after_poll() {
        let client = serve().await;

        let err = client.results("nodeInfo").await.unwrap_err();
        assert!(err.to_string().contains("503"));
        assert!(client.results("nope").await.unwrap_err().to_string().contains("404"));

        let summaries = client.poll(None).await.unwrap();
        assert_eq!(summaries.len(), 2);
        let single = client.poll(Some("nodeStatus")).await.unwrap();
        assert_eq!(single[0].polled, 2);

        let results = client.results("nodeInfo").await.unwrap();
        match results.get("a").unwrap() {
            MonitorData::Info(info) => {
                assert_eq!(info.computer_name, "a");
                assert_eq!(info.allowed_labels().to_vec(), vec!["linux"]);
            }
            other => panic!("unexpected data {other:?}"),
        }

        let detail = client.node("b").await.unwrap();
        assert_eq!(detail.columns.len(), 2);
        assert!(client.node("ghost").await.is_err());
    }

    #[tokio::test]
    async fn toggles_enabled_state() {
        let client = serve().await;
        let node = client.set_enabled("a", false).await.unwrap();
        assert!(!node.enabled);
        assert!(!node.is_online());
        assert_eq!(client.health().await.unwrap().online, 1);

        let node = client.set_enabled("a", true).await.unwrap();
        assert!(node.enabled);
        assert!(node.is_online());
        assert_eq!(client.health().await.unwrap().online, 2);
        assert!(client.set_enabled("ghost", true).await.is_err());
    }

    #[tokio::test]
    async fn label_endpoint_honours_max() {
        let client = serve().await;
        let view = client.labels("a", 0, true).await.unwrap();
        assert!(view.allowed.is_empty());
        assert_eq!(view.all, vec!["linux"]);
    }

    #[test]
    fn resolves_daemon_url_from_config() {
        let mut config = Config::default();
        let client = NodewatchClient::from_config(None, &config).unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:9200");

        config.daemon_url = Some("http://monitor:9300/".into());
        let client = NodewatchClient::from_config(None, &config).unwrap();
        assert_eq!(client.base_url, "http://monitor:9300");

        let client = NodewatchClient::from_config(Some("http://other"), &config).unwrap();
        assert_eq!(client.base_url, "http://other");
    }
}
