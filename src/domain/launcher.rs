//! Agent launcher: attaches channels to registered nodes.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{debug, info, warn};

use super::labels::LabelSet;
use super::node::{Channel, LaunchMode, OfflineCause};
use super::registry::NodeRegistry;

pub struct AgentLauncher {
    http: Client,
}

impl AgentLauncher {
    pub fn new(probe_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(probe_timeout)
            .build()
            .context("building launcher HTTP client")?;
        Ok(Self { http })
    }

    /// Try to attach a channel to `name`. Returns whether the node is now connected.
    pub async fn launch(&self, registry: &NodeRegistry, name: &str) -> Result<bool> {
        let node = registry
            .get(name)
            .await
            .with_context(|| format!("unknown node '{}'", name))?;

        if !node.enabled {
            debug!(node = %name, "node disabled, not launching");
            return Ok(false);
        }
        let Some(url) = node.agent_url.as_deref() else {
            debug!(node = %name, "no agent url configured");
            return Ok(false);
        };
        let channel = Channel::new(url);

        if node.launch_mode == LaunchMode::Http {
            registry.set_connecting(name, true).await?;
            if !self.probe(&channel).await {
                registry.set_connecting(name, false).await?;
                warn!(node = %name, url = %channel, "agent unreachable");
                return Ok(false);
            }
            if let Some(labels) = self.fetch_labels(&channel).await {
                registry.set_dynamic_labels(name, labels).await?;
            }
        }

        registry.connect(name, channel).await?;
        Ok(true)
    }

    /// Launch every node that currently has no channel.
    pub async fn launch_disconnected(&self, registry: &NodeRegistry) -> usize {
        let mut connected = 0;
        for node in registry.list().await {
            if node.channel.is_some() {
                continue;
            }
            match self.launch(registry, &node.name).await {
                Ok(true) => connected += 1,
                Ok(false) => {}
                Err(e) => warn!(node = %node.name, error = %e, "launch failed"),
            }
        }
        if connected > 0 {
            info!(connected, "attached agent channels");
        }
        connected
    }

    /// Re-probe HTTP-launched nodes that hold a channel and detach the
    /// unreachable ones so the next launch pass can reattach them.
    pub async fn verify_connected(&self, registry: &NodeRegistry) -> usize {
        let mut detached = 0;
        for node in registry.list().await {
            if node.launch_mode != LaunchMode::Http {
                continue;
            }
            let Some(channel) = node.channel.as_ref() else {
                continue;
            };
            if self.probe(channel).await {
                continue;
            }
            match registry.disconnect(&node.name, OfflineCause::disconnected()).await {
                Ok(()) => detached += 1,
                Err(e) => warn!(node = %node.name, error = %e, "detach failed"),
            }
        }
        if detached > 0 {
            warn!(detached, "detached unreachable agents");
        }
        detached
    }

    async fn probe(&self, channel: &Channel) -> bool {
        let url = format!("{}/health", channel.endpoint());
        match self.http.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(url = %url, error = %e, "probe failed");
                false
            }
        }
    }

    async fn fetch_labels(&self, channel: &Channel) -> Option<LabelSet> {
        let url = format!("{}/api/v1/labels", channel.endpoint());
        let resp = self.http.get(&url).send().await.ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let labels: Vec<String> = resp.json().await.ok()?;
        Some(labels.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registry::tests::offline_node;
    use axum::routing::get;
    use axum::{Json, Router};
    use tokio::net::TcpListener;

    async fn spawn_agent() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route("/health", get(|| async { "ok" }))
            .route(
                "/api/v1/labels",
                get(|| async { Json(vec!["gpu".to_string(), "cuda".to_string()]) }),
            );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn dead_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn http_launch_checks_health_and_fetches_labels() {
        let registry = NodeRegistry::new();
        let mut node = offline_node("a", "linux");
        node.launch_mode = LaunchMode::Http;
        node.agent_url = Some(spawn_agent().await);
        registry.register(node).await;

        let launcher = AgentLauncher::new(Duration::from_secs(2)).unwrap();
        assert!(launcher.launch(&registry, "a").await.unwrap());

        let node = registry.get("a").await.unwrap();
        assert!(node.is_online());
        assert!(!node.connecting);
        assert_eq!(node.dynamic_labels.to_vec(), vec!["cuda", "gpu"]);
        assert_eq!(node.labels(true).len(), 3);
    }

    #[tokio::test]
    async fn unreachable_agent_stays_disconnected() {
        let registry = NodeRegistry::new();
        let mut node = offline_node("a", "");
        node.launch_mode = LaunchMode::Http;
        node.agent_url = Some(dead_url().await);
        registry.register(node).await;

        let launcher = AgentLauncher::new(Duration::from_secs(2)).unwrap();
        assert!(!launcher.launch(&registry, "a").await.unwrap());
        let node = registry.get("a").await.unwrap();
        assert!(node.channel.is_none());
        assert!(!node.connecting);
    }

    #[tokio::test]
    async fn unreachable_http_agent_is_detached() {
        let registry = NodeRegistry::new();
        let mut lost = offline_node("lost", "");
        lost.launch_mode = LaunchMode::Http;
        registry.register(lost).await;
        registry
            .connect("lost", Channel::new(dead_url().await))
            .await
            .unwrap();
        let mut alive = offline_node("alive", "");
        alive.launch_mode = LaunchMode::Http;
        registry.register(alive).await;
        registry
            .connect("alive", Channel::new(spawn_agent().await))
            .await
            .unwrap();
        registry.register(offline_node("manual", "")).await;
        registry
            .connect("manual", Channel::new(dead_url().await))
            .await
            .unwrap();

        let launcher = AgentLauncher::new(Duration::from_secs(2)).unwrap();
        assert_eq!(launcher.verify_connected(&registry).await, 1);

        let lost = registry.get("lost").await.unwrap();
        assert!(lost.channel.is_none());
        assert_eq!(lost.offline_cause().unwrap().cause_text, "disconnected");
        assert!(registry.get("alive").await.unwrap().is_online());
        assert!(registry.get("manual").await.unwrap().is_online());
    }

    #[tokio::test]
    async fn manual_launch_attaches_without_health_check() {
        let registry = NodeRegistry::new();
        let mut node = offline_node("a", "");
        node.agent_url = Some(dead_url().await);
        registry.register(node).await;
        registry.register(offline_node("no-url", "")).await;

        let launcher = AgentLauncher::new(Duration::from_secs(2)).unwrap();
        assert_eq!(launcher.launch_disconnected(&registry).await, 1);
        assert!(registry.get("a").await.unwrap().channel.is_some());
        assert!(registry.get("no-url").await.unwrap().channel.is_none());
    }
}
