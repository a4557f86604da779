//! Node registry: owns node state and serializes connectivity changes.
//!
//! The node table sits behind an `RwLock`; each node sits behind its own
//! `Mutex`, so transitions on the same node are serialized while different
//! nodes never contend.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::labels::LabelSet;
use super::node::{Channel, Connectivity, Node, OfflineCause};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("unknown node '{0}'")]
    UnknownNode(String),
    #[error("node '{0}' is administratively disabled")]
    Disabled(String),
}

/// Connectivity primitives consumed by the monitors.
#[async_trait]
pub trait ConnectivityRegistry: Send + Sync {
    /// Bring a node online. Returns whether the state changed.
    async fn mark_online(&self, node: &str) -> Result<bool, TransitionError>;

    /// Take a node offline with `cause`, replacing any previous cause.
    /// Returns whether the state changed.
    async fn mark_offline(&self, node: &str, cause: OfflineCause)
        -> Result<bool, TransitionError>;

    async fn channel(&self, node: &str) -> Option<Channel>;
}

#[derive(Default)]
pub struct NodeRegistry {
    nodes: RwLock<BTreeMap<String, Arc<Mutex<Node>>>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a node.
    pub async fn register(&self, node: Node) {
        let name = node.name.clone();
        self.nodes
            .write()
            .await
            .insert(name.clone(), Arc::new(Mutex::new(node)));
        debug!(node = %name, "registered node");
    }

    /// Snapshot of a single node.
    pub async fn get(&self, name: &str) -> Option<Node> {
        let entry = self.entry(name).await?;
        let node = entry.lock().await;
        Some(node.clone())
    }

    /// Snapshots of every node, ordered by name.
    pub async fn list(&self) -> Vec<Node> {
        let entries: Vec<_> = self.nodes.read().await.values().cloned().collect();
        let mut nodes = Vec::with_capacity(entries.len());
        for entry in entries {
            nodes.push(entry.lock().await.clone());
        }
        nodes
    }

    pub async fn names(&self) -> Vec<String> {
        self.nodes.read().await.keys().cloned().collect()
    }

    /// Attach a channel. Enabled nodes come online.
    pub async fn connect(&self, name: &str, channel: Channel) -> Result<(), TransitionError> {
        self.update(name, |node| {
            node.channel = Some(channel);
            node.connected_since = Some(Utc::now());
            node.connecting = false;
            if node.enabled {
                node.state = Connectivity::Online;
            }
        })
        .await?;
        info!(node = %name, "channel attached");
        Ok(())
    }

    /// Drop the channel and take the node offline.
    pub async fn disconnect(&self, name: &str, cause: OfflineCause) -> Result<(), TransitionError> {
        self.update(name, |node| {
            node.channel = None;
            node.connected_since = None;
            node.connecting = false;
            node.state = Connectivity::Offline { cause };
        })
        .await?;
        info!(node = %name, "channel detached");
        Ok(())
    }

    pub async fn set_connecting(&self, name: &str, connecting: bool) -> Result<(), TransitionError> {
        self.update(name, |node| node.connecting = connecting).await
    }

    pub async fn set_dynamic_labels(
        &self,
        name: &str,
        labels: LabelSet,
    ) -> Result<(), TransitionError> {
        self.update(name, |node| node.dynamic_labels = labels).await
    }

    /// Enable or disable a node. Disabling takes it offline; re-enabling a
    /// node that still holds a channel brings it back online.
    pub async fn set_enabled(&self, name: &str, enabled: bool) -> Result<(), TransitionError> {
        self.update(name, |node| {
            node.enabled = enabled;
            if !enabled {
                node.state = Connectivity::Offline {
                    cause: OfflineCause::new("administratively disabled", "registry"),
                };
            } else if node.channel.is_some() {
                node.state = Connectivity::Online;
            }
        })
        .await?;
        info!(node = %name, enabled, "administrative state changed");
        Ok(())
    }

    async fn entry(&self, name: &str) -> Option<Arc<Mutex<Node>>> {
        self.nodes.read().await.get(name).cloned()
    }

    async fn update<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Node) -> R,
    ) -> Result<R, TransitionError> {
        let entry = self
            .entry(name)
            .await
            .ok_or_else(|| TransitionError::UnknownNode(name.to_string()))?;
        let mut node = entry.lock().await;
        Ok(f(&mut node))
    }
}

#[async_trait]
impl ConnectivityRegistry for NodeRegistry {
    async fn mark_online(&self, name: &str) -> Result<bool, TransitionError> {
        let entry = self
            .entry(name)
            .await
            .ok_or_else(|| TransitionError::UnknownNode(name.to_string()))?;
        let mut node = entry.lock().await;

        if !node.enabled {
            return Err(TransitionError::Disabled(name.to_string()));
        }
        if node.is_online() {
            return Ok(false);
        }
        node.state = Connectivity::Online;
        info!(node = %name, "marked online");
        Ok(true)
    }

    async fn mark_offline(
        &self,
        name: &str,
        cause: OfflineCause,
    ) -> Result<bool, TransitionError> {
        self.update(name, |node| {
            let changed = node.is_online();
            info!(node = %name, cause = %cause, changed, "marked offline");
            node.state = Connectivity::Offline { cause };
            changed
        })
        .await
    }

    async fn channel(&self, name: &str) -> Option<Channel> {
        let entry = self.entry(name).await?;
        let node = entry.lock().await;
        node.channel.clone()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::node::LaunchMode;

    pub(crate) fn offline_node(name: &str, labels: &str) -> Node {
        Node {
            name: name.to_string(),
            agent_url: None,
            channel: None,
            label_string: labels.to_string(),
            dynamic_labels: LabelSet::default(),
            description: None,
            launch_mode: LaunchMode::Manual,
            enabled: true,
            connecting: false,
            connected_since: None,
            state: Connectivity::Offline {
                cause: OfflineCause::disconnected(),
            },
        }
    }

    pub(crate) async fn registry_with(names: &[&str]) -> NodeRegistry {
        let registry = NodeRegistry::new();
        for name in names {
            registry.register(offline_node(name, "linux")).await;
            registry
                .connect(name, Channel::new(format!("http://{name}:9100")))
                .await
                .unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn connect_brings_node_online() {
        let registry = NodeRegistry::new();
        registry.register(offline_node("a", "")).await;
        assert!(!registry.get("a").await.unwrap().is_online());
        assert!(registry.channel("a").await.is_none());

        registry.connect("a", Channel::new("http://a:9100")).await.unwrap();
        let node = registry.get("a").await.unwrap();
        assert!(node.is_online());
        assert!(node.connected_since.is_some());
        assert_eq!(registry.channel("a").await.unwrap().endpoint(), "http://a:9100");
    }

    #[tokio::test]
    async fn mark_online_is_idempotent() {
        let registry = registry_with(&["a"]).await;
        registry
            .mark_offline("a", OfflineCause::new("x", "test"))
            .await
            .unwrap();
        assert_eq!(registry.mark_online("a").await, Ok(true));
        assert_eq!(registry.mark_online("a").await, Ok(false));
        assert!(registry.get("a").await.unwrap().is_online());
    }

    #[tokio::test]
    async fn mark_offline_replaces_cause() {
        let registry = registry_with(&["a"]).await;
        let first = registry
            .mark_offline("a", OfflineCause::new("first", "test"))
            .await;
        let second = registry
            .mark_offline("a", OfflineCause::new("second", "test"))
            .await;
        assert_eq!(first, Ok(true));
        assert_eq!(second, Ok(false));
        let node = registry.get("a").await.unwrap();
        assert_eq!(node.offline_cause().unwrap().cause_text, "second");
    }

    #[tokio::test]
    async fn disabled_node_refuses_online() {
        let registry = registry_with(&["a"]).await;
        registry.set_enabled("a", false).await.unwrap();
        assert_eq!(
            registry.mark_online("a").await,
            Err(TransitionError::Disabled("a".into()))
        );
        assert!(!registry.get("a").await.unwrap().is_online());
    }

    #[tokio::test]
    async fn unknown_node_is_an_error() {
        let registry = NodeRegistry::new();
        assert_eq!(
            registry.mark_online("ghost").await,
            Err(TransitionError::UnknownNode("ghost".into()))
        );
        assert!(registry.get("ghost").await.is_none());
        assert!(registry.channel("ghost").await.is_none());
    }

    #[tokio::test]
    async fn disconnect_clears_channel() {
        let registry = registry_with(&["a"]).await;
        registry
            .disconnect("a", OfflineCause::disconnected())
            .await
            .unwrap();
        let node = registry.get("a").await.unwrap();
        assert!(node.channel.is_none());
        assert!(node.connected_since.is_none());
        assert_eq!(node.offline_cause().unwrap().trigger, "connection");
    }

    #[tokio::test]
    async fn reenabling_connected_node_brings_it_online() {
        let registry = registry_with(&["a"]).await;
        registry.register(offline_node("detached", "")).await;

        registry.set_enabled("a", false).await.unwrap();
        registry.set_enabled("detached", false).await.unwrap();
        assert!(!registry.get("a").await.unwrap().is_online());

        registry.set_enabled("a", true).await.unwrap();
        let node = registry.get("a").await.unwrap();
        assert!(node.enabled);
        assert!(node.is_online());
        assert!(node.offline_cause().is_none());

        registry.set_enabled("detached", true).await.unwrap();
        let node = registry.get("detached").await.unwrap();
        assert!(!node.is_online());
        assert_eq!(
            node.offline_cause().unwrap().cause_text,
            "administratively disabled"
        );
        assert!(registry.set_enabled("ghost", true).await.is_err());
    }

    #[tokio::test]
    async fn list_is_sorted_by_name() {
        let registry = registry_with(&["c", "a", "b"]).await;
        let names: Vec<_> = registry.list().await.into_iter().map(|n| n.name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(registry.names().await.len(), 3);
    }
}
