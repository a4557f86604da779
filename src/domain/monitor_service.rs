//! Monitor service: runs poll cycles and keeps the latest results.
//!
//! Each cycle polls every node concurrently for one monitor. Results are
//! kept per monitor, keyed by node; monitors themselves hold no state
//! between cycles.
//!
//! A per-node poll that exceeds `node_timeout` is dropped before it can
//! apply a transition and the node is reported as skipped.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_graphql::SimpleObject;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::domain::evaluator::HttpEvaluator;
use crate::domain::registry::NodeRegistry;
use crate::domain::types::{local_hostname, DaemonHealth, NodeDetail};
use crate::domain::verdict::Verdict;
use crate::monitors::{self, ColumnDescriptor, MonitorData, MonitorKind, NodeMonitor};

/// Latest data one monitor produced for one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
pub struct NodeResult {
    pub node: String,
    pub data: MonitorData,
}

/// One column of a node's row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
pub struct ColumnValue {
    pub column: ColumnDescriptor,
    pub data: MonitorData,
}

/// Results of the most recent cycle of one monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
pub struct MonitorResults {
    pub monitor_id: String,
    pub collected_at: DateTime<Utc>,
    /// Ordered by node name. A skipped node keeps its entry from the
    /// previous cycle, if it had one.
    pub data: Vec<NodeResult>,
    /// Nodes that timed out or were still being polled by an earlier cycle.
    pub skipped: Vec<String>,
}

impl MonitorResults {
    pub fn get(&self, node: &str) -> Option<&MonitorData> {
        self.data.iter().find(|r| r.node == node).map(|r| &r.data)
    }
}

/// Counts from one cycle of one monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
pub struct PollSummary {
    pub monitor_id: String,
    pub kind: MonitorKind,
    /// Unhealthy verdicts of an ignored monitor caused no transitions.
    pub ignored: bool,
    pub polled: u32,
    pub skipped: u32,
    pub healthy: u32,
    pub unhealthy: u32,
    pub indeterminate: u32,
}

type InFlight = Arc<Mutex<HashSet<(String, String)>>>;

/// Marks a `(monitor, node)` poll as running; cleared on drop.
struct InFlightGuard {
    in_flight: InFlight,
    key: (String, String),
}

impl InFlightGuard {
    fn acquire(in_flight: &InFlight, monitor: &str, node: &str) -> Option<Self> {
        let key = (monitor.to_string(), node.to_string());
        let mut set = in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(key.clone()) {
            return None;
        }
        Some(Self {
            in_flight: in_flight.clone(),
            key,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.key);
    }
}

pub struct MonitorService {
    registry: Arc<NodeRegistry>,
    monitors: Vec<Arc<dyn NodeMonitor>>,
    results: RwLock<HashMap<String, MonitorResults>>,
    in_flight: InFlight,
    node_timeout: Duration,
    start_time: Instant,
}

impl MonitorService {
    pub fn new(
        registry: Arc<NodeRegistry>,
        monitors: Vec<Arc<dyn NodeMonitor>>,
        node_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            monitors,
            results: RwLock::new(HashMap::new()),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            node_timeout,
            start_time: Instant::now(),
        }
    }

    /// Register configured nodes and build the configured monitors.
    pub async fn from_config(config: &Config) -> Result<Arc<Self>> {
        let registry = Arc::new(NodeRegistry::new());
        for node in &config.nodes {
            registry.register(node.to_node()).await;
        }

        let evaluator = Arc::new(
            HttpEvaluator::new(Duration::from_secs(config.daemon.eval_timeout_secs))
                .context("creating remote evaluator")?,
        );
        let monitors = monitors::build(&config.effective_monitors(), evaluator, registry.clone());
        for monitor in monitors.iter().filter(|m| m.is_ignored()) {
            info!(monitor = %monitor.id(), kind = ?monitor.kind(), "monitor is ignored, verdicts will not change connectivity");
        }

        info!(
            nodes = config.nodes.len(),
            monitors = monitors.len(),
            "monitor service configured"
        );

        Ok(Arc::new(Self::new(
            registry,
            monitors,
            Duration::from_secs(config.daemon.node_timeout_secs),
        )))
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn columns(&self) -> Vec<ColumnDescriptor> {
        monitors::columns(&self.monitors)
    }

    pub fn monitor(&self, id: &str) -> Option<Arc<dyn NodeMonitor>> {
        self.monitors.iter().find(|m| m.id() == id).cloned()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Latest results of one monitor. Never triggers a poll.
    pub async fn results(&self, monitor_id: &str) -> Option<MonitorResults> {
        self.results.read().await.get(monitor_id).cloned()
    }

    /// Latest data for one node across all monitors, in column order.
    pub async fn node_data(&self, node: &str) -> Vec<ColumnValue> {
        let results = self.results.read().await;
        self.columns()
            .into_iter()
            .filter_map(|column| {
                let data = results.get(&column.monitor_id)?.get(node)?.clone();
                Some(ColumnValue { column, data })
            })
            .collect()
    }

    pub async fn node_detail(&self, name: &str) -> Option<NodeDetail> {
        let node = self.registry.get(name).await?;
        let columns = self.node_data(name).await;
        Some(NodeDetail { node, columns })
    }

    pub async fn health(&self) -> DaemonHealth {
        let nodes = self.registry.list().await;
        DaemonHealth {
            version: env!("CARGO_PKG_VERSION").to_string(),
            hostname: local_hostname(),
            uptime_secs: self.uptime_secs(),
            nodes: nodes.len() as u32,
            online: nodes.iter().filter(|n| n.is_online()).count() as u32,
            monitors: self.monitors.len() as u32,
        }
    }

    /// Run one cycle of a single monitor.
    pub async fn poll(&self, monitor_id: &str) -> Result<PollSummary> {
        let monitor = self
            .monitor(monitor_id)
            .with_context(|| format!("unknown monitor '{}'", monitor_id))?;
        Ok(self.poll_monitor(monitor).await)
    }

    /// Run one cycle of every monitor.
    pub async fn poll_all(&self) -> Vec<PollSummary> {
        let mut summaries = Vec::with_capacity(self.monitors.len());
        for monitor in &self.monitors {
            summaries.push(self.poll_monitor(monitor.clone()).await);
        }
        summaries
    }

    async fn poll_monitor(&self, monitor: Arc<dyn NodeMonitor>) -> PollSummary {
        let monitor_id = monitor.id().to_string();
        let mut skipped = Vec::new();
        let mut tasks = JoinSet::new();

        for node in self.registry.list().await {
            let Some(guard) = InFlightGuard::acquire(&self.in_flight, &monitor_id, &node.name)
            else {
                debug!(monitor = %monitor_id, node = %node.name, "previous poll still running");
                skipped.push(node.name);
                continue;
            };

            let monitor = monitor.clone();
            let timeout = self.node_timeout;
            tasks.spawn(async move {
                let _guard = guard;
                let data = tokio::time::timeout(timeout, monitor.data(&node)).await.ok();
                (node.name, data)
            });
        }

        let mut data = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((node, Some(d))) => data.push(NodeResult { node, data: d }),
                Ok((node, None)) => {
                    warn!(monitor = %monitor_id, node = %node, "poll timed out, skipping node");
                    skipped.push(node);
                }
                Err(e) => error!(monitor = %monitor_id, error = %e, "poll task failed"),
            }
        }
        skipped.sort();
        let summary = summarize(monitor.as_ref(), &data, skipped.len());

        // Skipped nodes keep whatever the previous cycle reported for them
        let mut results = self.results.write().await;
        if let Some(previous) = results.get(&monitor_id) {
            data.extend(
                previous
                    .data
                    .iter()
                    .filter(|r| skipped.contains(&r.node))
                    .cloned(),
            );
        }
        data.sort_by(|a, b| a.node.cmp(&b.node));

        debug!(
            monitor = %monitor_id,
            polled = summary.polled,
            skipped = summary.skipped,
            "poll cycle completed"
        );

        results.insert(
            monitor_id.clone(),
            MonitorResults {
                monitor_id,
                collected_at: Utc::now(),
                data,
                skipped,
            },
        );

        summary
    }
}

fn summarize(monitor: &dyn NodeMonitor, data: &[NodeResult], skipped: usize) -> PollSummary {
    let mut summary = PollSummary {
        monitor_id: monitor.id().to_string(),
        kind: monitor.kind(),
        ignored: monitor.is_ignored(),
        polled: data.len() as u32,
        skipped: skipped as u32,
        healthy: 0,
        unhealthy: 0,
        indeterminate: 0,
    };
    for result in data {
        if let MonitorData::Property(r) = &result.data {
            match r.verdict {
                Verdict::Healthy => summary.healthy += 1,
                Verdict::Unhealthy => summary.unhealthy += 1,
                Verdict::Indeterminate => summary.indeterminate += 1,
            }
        }
    }
    summary
}
