//! Node status column: current connectivity as recorded by the registry.

use async_graphql::SimpleObject;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ColumnDescriptor, MonitorData, MonitorKind, NodeMonitor};
use crate::domain::node::Node;

pub const POSITION: i32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
pub struct StatusData {
    pub online: bool,
    pub connected: bool,
    pub connecting: bool,
    pub enabled: bool,
    pub offline_cause: Option<String>,
}

pub struct NodeStatus {
    id: String,
}

impl NodeStatus {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl NodeMonitor for NodeStatus {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> MonitorKind {
        MonitorKind::NodeStatus
    }

    fn column(&self) -> ColumnDescriptor {
        ColumnDescriptor {
            monitor_id: self.id.clone(),
            kind: MonitorKind::NodeStatus,
            name: "Status".to_string(),
            tooltip: "Online state of the node".to_string(),
            position: POSITION,
        }
    }

    async fn data(&self, node: &Node) -> MonitorData {
        MonitorData::Status(StatusData {
            online: node.is_online(),
            connected: node.channel.is_some(),
            connecting: node.connecting,
            enabled: node.enabled,
            offline_cause: node.offline_cause().map(|c| c.to_string()),
        })
    }
}
