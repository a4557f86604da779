//! API view types shared by the REST and GraphQL layers.

use async_graphql::SimpleObject;
use serde::{Deserialize, Serialize};

use super::labels::LabelSet;
use super::monitor_service::ColumnValue;
use super::node::Node;

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct DaemonHealth {
    pub version: String,
    pub hostname: String,
    pub uptime_secs: u64,
    pub nodes: u32,
    pub online: u32,
    pub monitors: u32,
}

/// A node snapshot with its latest column values.
#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct NodeDetail {
    pub node: Node,
    pub columns: Vec<ColumnValue>,
}

/// Label columns for one node: the display-limited prefix and the full set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
pub struct LabelView {
    pub node: String,
    pub max_count: i32,
    pub allowed: Vec<String>,
    pub all: Vec<String>,
}

impl LabelView {
    pub fn new(node: &Node, include_dynamic: bool, max_count: i32) -> Self {
        let labels: LabelSet = node.labels(include_dynamic);
        Self {
            node: node.name.clone(),
            max_count,
            allowed: labels.allowed(max_count).to_vec(),
            all: labels.all().to_vec(),
        }
    }
}

pub fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registry::tests::offline_node;

    #[test]
    fn label_view_limits_prefix() {
        let mut node = offline_node("a", "zeta alpha mid");
        node.dynamic_labels = ["gpu".to_string()].into_iter().collect();

        let view = LabelView::new(&node, false, 2);
        assert_eq!(view.allowed, vec!["alpha", "mid"]);
        assert_eq!(view.all, vec!["alpha", "mid", "zeta"]);

        let view = LabelView::new(&node, true, -1);
        assert_eq!(view.allowed, view.all);
        assert_eq!(view.all.len(), 4);
    }
}
