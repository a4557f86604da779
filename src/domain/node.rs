//! Node: a managed agent as seen by the monitor.
//!
//! A `Node` is a point-in-time snapshot taken from the registry. Monitors
//! only ever read snapshots; connectivity changes go through the registry.

use async_graphql::{ComplexObject, Enum, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::labels::LabelSet;

/// Fallback text for an offline cause with nothing better to say.
pub const DEFAULT_CAUSE_TEXT: &str = "Node property check failed";

/// An active communication path to a node (the agent's base URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(String);

impl Channel {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self(endpoint.into().trim_end_matches('/').to_string())
    }

    pub fn endpoint(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fleet node snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct Node {
    pub name: String,
    /// Configured agent address; becomes the channel once attached.
    pub agent_url: Option<String>,
    #[graphql(skip)]
    pub channel: Option<Channel>,
    pub label_string: String,
    #[graphql(skip)]
    pub dynamic_labels: LabelSet,
    pub description: Option<String>,
    pub launch_mode: LaunchMode,
    pub enabled: bool,
    pub connecting: bool,
    pub connected_since: Option<DateTime<Utc>>,
    #[graphql(skip)]
    pub state: Connectivity,
}

#[ComplexObject]
impl Node {
    async fn channel(&self) -> Option<String> {
        self.channel.as_ref().map(|c| c.to_string())
    }

    async fn dynamic_labels(&self) -> Vec<String> {
        self.dynamic_labels.to_vec()
    }

    async fn online(&self) -> bool {
        self.is_online()
    }

    #[graphql(name = "offlineCause")]
    async fn resolve_offline_cause(&self) -> Option<OfflineCause> {
        self.offline_cause().cloned()
    }
}

impl Node {
    pub fn is_online(&self) -> bool {
        matches!(self.state, Connectivity::Online)
    }

    pub fn offline_cause(&self) -> Option<&OfflineCause> {
        match &self.state {
            Connectivity::Online => None,
            Connectivity::Offline { cause } => Some(cause),
        }
    }

    /// Static labels, plus dynamic ones when requested.
    pub fn labels(&self, include_dynamic: bool) -> LabelSet {
        let labels = LabelSet::parse(&self.label_string);
        if include_dynamic {
            labels.union(&self.dynamic_labels)
        } else {
            labels
        }
    }
}

/// Persistent connectivity state of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Connectivity {
    Online,
    Offline { cause: OfflineCause },
}

/// Reason recorded when a node is taken offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
pub struct OfflineCause {
    pub cause_text: String,
    /// Identity of the monitor (or subsystem) that took the node offline.
    pub trigger: String,
    pub recorded_at: DateTime<Utc>,
}

impl OfflineCause {
    pub fn new(cause_text: impl Into<String>, trigger: impl Into<String>) -> Self {
        Self {
            cause_text: cause_text.into(),
            trigger: trigger.into(),
            recorded_at: Utc::now(),
        }
    }

    pub fn disconnected() -> Self {
        Self::new("disconnected", "connection")
    }
}

impl std::fmt::Display for OfflineCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cause_text.is_empty() {
            f.write_str(DEFAULT_CAUSE_TEXT)
        } else {
            f.write_str(&self.cause_text)
        }
    }
}

/// How the daemon attaches a channel to a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Enum)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    /// Probe the agent's health endpoint before attaching.
    #[default]
    Http,
    /// Attach the configured URL without probing.
    Manual,
}

impl std::fmt::Display for LaunchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Manual => write!(f, "manual"),
        }
    }
}
