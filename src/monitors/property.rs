//! Scripted property monitor: tri-state checks evaluated on the agent.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::transition;
use super::{ColumnDescriptor, MonitorData, MonitorKind, NodeMonitor};
use crate::domain::evaluator::RemoteEvaluator;
use crate::domain::node::{Channel, Node};
use crate::domain::registry::ConnectivityRegistry;
use crate::domain::verdict::{EvaluationResult, Verdict};

pub const DEFAULT_POSITION: i32 = 100;

/// Expressions and column metadata for one property check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckSpec {
    pub value_expr: Option<String>,
    /// Must evaluate to exactly `true` for the node to be healthy. Without
    /// it no judgment is made.
    pub range_expr: Option<String>,
    pub detail_expr: Option<String>,
    pub column_name: String,
    pub column_tooltip: String,
}

pub struct NodeProperty {
    id: String,
    spec: CheckSpec,
    ignored: bool,
    position: i32,
    evaluator: Arc<dyn RemoteEvaluator>,
    registry: Arc<dyn ConnectivityRegistry>,
}

impl NodeProperty {
    pub fn new(
        id: impl Into<String>,
        spec: CheckSpec,
        evaluator: Arc<dyn RemoteEvaluator>,
        registry: Arc<dyn ConnectivityRegistry>,
    ) -> Self {
        Self {
            id: id.into(),
            spec,
            ignored: false,
            position: DEFAULT_POSITION,
            evaluator,
            registry,
        }
    }

    pub fn with_ignored(mut self, ignored: bool) -> Self {
        self.ignored = ignored;
        self
    }

    pub fn with_position(mut self, position: i32) -> Self {
        self.position = position;
        self
    }

    /// Value, range and detail are evaluated independently; a failure in
    /// one never affects the others. Only a missing channel short-circuits.
    async fn evaluate_on(&self, node: &str, channel: Option<&Channel>) -> EvaluationResult {
        let Some(channel) = channel else {
            debug!(node = %node, monitor = %self.id, "no channel, skipping evaluation");
            return EvaluationResult::indeterminate();
        };

        let (verdict, value, detail) = tokio::join!(
            self.judge(node, channel),
            self.fetch(node, channel, self.spec.value_expr.as_deref(), "value"),
            self.fetch(node, channel, self.spec.detail_expr.as_deref(), "detail"),
        );

        EvaluationResult {
            verdict,
            value,
            detail,
        }
    }

    async fn judge(&self, node: &str, channel: &Channel) -> Verdict {
        let Some(expr) = self.spec.range_expr.as_deref() else {
            return Verdict::Indeterminate;
        };

        match self.evaluator.run(expr, channel).await {
            Ok(output) => Verdict::from_range_output(&output),
            Err(e) => {
                info!(
                    node = %node,
                    expression = %expr,
                    error = %e,
                    "failed to check property range"
                );
                Verdict::Indeterminate
            }
        }
    }

    async fn fetch(
        &self,
        node: &str,
        channel: &Channel,
        expr: Option<&str>,
        field: &str,
    ) -> Option<String> {
        let expr = expr?;
        match self.evaluator.run(expr, channel).await {
            Ok(output) => Some(output),
            Err(e) => {
                info!(
                    node = %node,
                    expression = %expr,
                    field,
                    error = %e,
                    "failed to get property"
                );
                None
            }
        }
    }
}

#[async_trait]
impl NodeMonitor for NodeProperty {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> MonitorKind {
        MonitorKind::NodeProperty
    }

    fn column(&self) -> ColumnDescriptor {
        let tooltip = if self.spec.column_tooltip.is_empty() {
            self.spec.column_name.clone()
        } else {
            self.spec.column_tooltip.clone()
        };
        ColumnDescriptor {
            monitor_id: self.id.clone(),
            kind: MonitorKind::NodeProperty,
            name: self.spec.column_name.clone(),
            tooltip,
            position: self.position,
        }
    }

    fn is_ignored(&self) -> bool {
        self.ignored
    }

    async fn data(&self, node: &Node) -> MonitorData {
        let channel = self.registry.channel(&node.name).await;
        let result = self.evaluate_on(&node.name, channel.as_ref()).await;

        if self.ignored {
            debug!(node = %node.name, monitor = %self.id, verdict = %result.verdict, "monitor ignored, no transition");
        } else {
            let outcome =
                transition::apply(self.registry.as_ref(), &node.name, &result, &self.spec, &self.id)
                    .await;
            debug!(node = %node.name, monitor = %self.id, ?outcome, "property evaluated");
        }

        MonitorData::Property(result)
    }
}
