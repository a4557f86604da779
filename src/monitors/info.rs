//! Node info column: name, labels and optional connection details.
//!
//! This monitor never changes connectivity.

use async_graphql::{ComplexObject, SimpleObject};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ColumnDescriptor, MonitorData, MonitorKind, NodeMonitor};
use crate::domain::labels::LabelSet;
use crate::domain::node::{LaunchMode, Node};

pub const POSITION: i32 = 2;

/// Display switches for the info column. Everything is off by default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfoSettings {
    pub show_dynamic_labels: bool,
    /// Negative shows every label.
    pub max_label_count: i32,
    pub show_description: bool,
    pub show_connect_since: bool,
    pub show_launch_mode: bool,
    pub show_offline_cause: bool,
    pub show_connecting_state: bool,
}

pub struct NodeInfo {
    id: String,
    settings: InfoSettings,
}

impl NodeInfo {
    /// A configured `max_label_count` of zero is treated as one.
    pub fn new(id: impl Into<String>, mut settings: InfoSettings) -> Self {
        if settings.max_label_count == 0 {
            settings.max_label_count = 1;
        }
        Self {
            id: id.into(),
            settings,
        }
    }

    /// Build the column data for `name`. An unknown node has no labels.
    pub fn describe(&self, name: &str, node: Option<&Node>) -> InfoData {
        let s = &self.settings;
        let labels = node
            .map(|n| n.labels(s.show_dynamic_labels))
            .unwrap_or_default();

        InfoData {
            computer_name: name.to_string(),
            max_label_count: s.max_label_count,
            labels,
            description: node
                .filter(|_| s.show_description)
                .and_then(|n| n.description.clone()),
            connected_since: node
                .filter(|_| s.show_connect_since)
                .and_then(|n| n.connected_since),
            launch_mode: node.filter(|_| s.show_launch_mode).map(|n| n.launch_mode),
            offline_cause: node
                .filter(|_| s.show_offline_cause)
                .and_then(|n| n.offline_cause())
                .map(|c| c.to_string()),
            connecting: node
                .filter(|_| s.show_connecting_state)
                .map(|n| n.connecting),
        }
    }
}

#[async_trait]
impl NodeMonitor for NodeInfo {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> MonitorKind {
        MonitorKind::NodeInfo
    }

    fn column(&self) -> ColumnDescriptor {
        ColumnDescriptor {
            monitor_id: self.id.clone(),
            kind: MonitorKind::NodeInfo,
            name: "Node".to_string(),
            tooltip: "Node name, labels and connection details".to_string(),
            position: POSITION,
        }
    }

    async fn data(&self, node: &Node) -> MonitorData {
        MonitorData::Info(self.describe(&node.name, Some(node)))
    }
}

/// Info column data for one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
#[serde(into = "InfoDataRepr", from = "InfoDataRepr")]
#[graphql(complex)]
pub struct InfoData {
    pub computer_name: String,
    pub max_label_count: i32,
    #[graphql(skip)]
    pub labels: LabelSet,
    pub description: Option<String>,
    pub connected_since: Option<DateTime<Utc>>,
    pub launch_mode: Option<LaunchMode>,
    pub offline_cause: Option<String>,
    pub connecting: Option<bool>,
}

impl InfoData {
    pub fn allowed_labels(&self) -> LabelSet {
        self.labels.allowed(self.max_label_count)
    }

    pub fn all_labels(&self) -> LabelSet {
        self.labels.all()
    }
}

#[ComplexObject]
impl InfoData {
    #[graphql(name = "allowedLabels")]
    async fn resolve_allowed_labels(&self) -> Vec<String> {
        self.allowed_labels().to_vec()
    }

    #[graphql(name = "allLabels")]
    async fn resolve_all_labels(&self) -> Vec<String> {
        self.all_labels().to_vec()
    }
}

/// Wire form of `InfoData`, carrying both label views.
#[derive(Serialize, Deserialize)]
struct InfoDataRepr {
    computer_name: String,
    max_label_count: i32,
    allowed_labels: Vec<String>,
    all_labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    connected_since: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    launch_mode: Option<LaunchMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    offline_cause: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    connecting: Option<bool>,
}

impl From<InfoData> for InfoDataRepr {
    fn from(data: InfoData) -> Self {
        Self {
            allowed_labels: data.allowed_labels().to_vec(),
            all_labels: data.all_labels().to_vec(),
            computer_name: data.computer_name,
            max_label_count: data.max_label_count,
            description: data.description,
            connected_since: data.connected_since,
            launch_mode: data.launch_mode,
            offline_cause: data.offline_cause,
            connecting: data.connecting,
        }
    }
}

impl From<InfoDataRepr> for InfoData {
    fn from(repr: InfoDataRepr) -> Self {
        Self {
            computer_name: repr.computer_name,
            max_label_count: repr.max_label_count,
            labels: repr.all_labels.into_iter().collect(),
            description: repr.description,
            connected_since: repr.connected_since,
            launch_mode: repr.launch_mode,
            offline_cause: repr.offline_cause,
            connecting: repr.connecting,
        }
    }
}
