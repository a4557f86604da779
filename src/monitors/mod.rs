//! Node monitors: column producers evaluated once per node per poll cycle.

pub mod info;
pub mod property;
pub mod status;
pub mod transition;

use std::collections::HashSet;
use std::sync::Arc;

use async_graphql::{Enum, SimpleObject, Union};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::MonitorConfig;
use crate::domain::evaluator::RemoteEvaluator;
use crate::domain::node::Node;
use crate::domain::registry::ConnectivityRegistry;
use crate::domain::verdict::EvaluationResult;

use self::info::{InfoData, NodeInfo};
use self::property::NodeProperty;
use self::status::{NodeStatus, StatusData};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Enum)]
#[serde(rename_all = "snake_case")]
pub enum MonitorKind {
    NodeProperty,
    NodeInfo,
    NodeStatus,
}

impl MonitorKind {
    /// Default monitor id for this kind.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::NodeProperty => "nodeProperty",
            Self::NodeInfo => "nodeInfo",
            Self::NodeStatus => "nodeStatus",
        }
    }
}

/// Display metadata for one monitor's column. Lower positions sort first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
pub struct ColumnDescriptor {
    pub monitor_id: String,
    pub kind: MonitorKind,
    pub name: String,
    pub tooltip: String,
    pub position: i32,
}

/// Per-node output of a monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Union)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MonitorData {
    Property(EvaluationResult),
    Info(InfoData),
    Status(StatusData),
}

#[async_trait]
pub trait NodeMonitor: Send + Sync {
    fn id(&self) -> &str;

    fn kind(&self) -> MonitorKind;

    fn column(&self) -> ColumnDescriptor;

    /// Ignored monitors report data but never change connectivity.
    fn is_ignored(&self) -> bool {
        false
    }

    async fn data(&self, node: &Node) -> MonitorData;
}

/// Instantiate monitors from configuration, assigning unique ids.
pub fn build(
    configs: &[MonitorConfig],
    evaluator: Arc<dyn RemoteEvaluator>,
    registry: Arc<dyn ConnectivityRegistry>,
) -> Vec<Arc<dyn NodeMonitor>> {
    let mut seen = HashSet::new();
    let mut monitors: Vec<Arc<dyn NodeMonitor>> = Vec::with_capacity(configs.len());

    for (index, config) in configs.iter().enumerate() {
        let kind = config.kind();
        let base = config
            .id()
            .map(str::to_string)
            .unwrap_or_else(|| kind.symbol().to_string());
        let mut id = base.clone();
        let mut suffix = index;
        while !seen.insert(id.clone()) {
            id = format!("{}-{}", base, suffix);
            suffix += 1;
        }

        let monitor: Arc<dyn NodeMonitor> = match config {
            MonitorConfig::NodeProperty {
                check,
                ignored,
                position,
                ..
            } => Arc::new(
                NodeProperty::new(id, check.clone(), evaluator.clone(), registry.clone())
                    .with_ignored(*ignored)
                    .with_position(*position),
            ),
            MonitorConfig::NodeInfo { settings, .. } => Arc::new(NodeInfo::new(id, settings.clone())),
            MonitorConfig::NodeStatus { .. } => Arc::new(NodeStatus::new(id)),
        };
        monitors.push(monitor);
    }

    monitors
}

/// Column descriptors ordered for display.
pub fn columns(monitors: &[Arc<dyn NodeMonitor>]) -> Vec<ColumnDescriptor> {
    let mut columns: Vec<_> = monitors.iter().map(|m| m.column()).collect();
    columns.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)));
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registry::NodeRegistry;
    use crate::monitors::info::InfoSettings;
    use crate::monitors::property::tests::ScriptedEvaluator;
    use crate::monitors::property::CheckSpec;

    fn property(name: &str, position: i32) -> MonitorConfig {
        MonitorConfig::NodeProperty {
            id: None,
            check: CheckSpec {
                column_name: name.to_string(),
                ..CheckSpec::default()
            },
            ignored: false,
            position,
        }
    }

    #[test]
    fn build_assigns_unique_ids_and_orders_columns() {
        let configs = vec![
            property("Disk", 100),
            property("Load", 50),
            MonitorConfig::NodeInfo {
                id: None,
                settings: InfoSettings::default(),
            },
            MonitorConfig::NodeStatus { id: Some("status".into()) },
        ];
        let monitors = build(
            &configs,
            Arc::new(ScriptedEvaluator::default()),
            Arc::new(NodeRegistry::new()),
        );

        let ids: Vec<_> = monitors.iter().map(|m| m.id().to_string()).collect();
        assert_eq!(ids, vec!["nodeProperty", "nodeProperty-1", "nodeInfo", "status"]);

        let names: Vec<_> = columns(&monitors).into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Status", "Node", "Load", "Disk"]);
    }

    #[test]
    fn suffixed_ids_skip_explicit_collisions() {
        let mut explicit = property("Load", 0);
        if let MonitorConfig::NodeProperty { id, .. } = &mut explicit {
            *id = Some("nodeProperty-2".into());
        }
        let configs = vec![property("Disk", 0), explicit, property("Temp", 0)];
        let monitors = build(
            &configs,
            Arc::new(ScriptedEvaluator::default()),
            Arc::new(NodeRegistry::new()),
        );

        let ids: Vec<_> = monitors.iter().map(|m| m.id().to_string()).collect();
        assert_eq!(ids, vec!["nodeProperty", "nodeProperty-2", "nodeProperty-3"]);
        assert!(monitors.iter().all(|m| m.kind() == MonitorKind::NodeProperty));
    }

    #[test]
    fn monitor_data_is_tagged_by_kind() {
        let data = MonitorData::Property(EvaluationResult::indeterminate());
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["kind"], "property");
        assert_eq!(json["verdict"], "indeterminate");
        let back: MonitorData = serde_json::from_value(json).unwrap();
        assert_eq!(back, data);
    }
}
