use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::domain::labels::LabelSet;
use crate::domain::node::{Connectivity, LaunchMode, Node, OfflineCause};
use crate::monitors::info::InfoSettings;
use crate::monitors::property::{self, CheckSpec};
use crate::monitors::MonitorKind;

const ENV_PREFIX: &str = "NODEWATCH_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub daemon: DaemonConfig,
    pub nodes: Vec<NodeConfig>,
    pub monitors: Vec<MonitorConfig>,
    /// Base URL of a running daemon, for `nodewatch query`.
    pub daemon_url: Option<String>,
}

impl Config {
    pub fn path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("could not determine config directory")?;
        Ok(config_dir.join("nodewatch").join("config.yaml"))
    }

    /// Configured monitors, or the status and info columns when none are set.
    pub fn effective_monitors(&self) -> Vec<MonitorConfig> {
        if self.monitors.is_empty() {
            vec![
                MonitorConfig::NodeStatus { id: None },
                MonitorConfig::NodeInfo {
                    id: None,
                    settings: InfoSettings::default(),
                },
            ]
        } else {
            self.monitors.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub http_addr: String,
    pub log_level: String,
    pub poll_interval_secs: u64,
    /// Bound on a single remote expression evaluation.
    pub eval_timeout_secs: u64,
    /// Bound on one monitor's whole poll of one node.
    pub node_timeout_secs: u64,
    /// How often nodes without a channel are relaunched. Zero disables.
    pub reconnect_interval_secs: u64,
    pub probe_timeout_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:9200".to_string(),
            log_level: "info".to_string(),
            poll_interval_secs: 60,
            eval_timeout_secs: 10,
            node_timeout_secs: 30,
            reconnect_interval_secs: 120,
            probe_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Whitespace-separated static labels.
    #[serde(default)]
    pub labels: String,
    #[serde(default)]
    pub dynamic_labels: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub launch: LaunchMode,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl NodeConfig {
    /// A registry entry for this node, offline until a channel is attached.
    pub fn to_node(&self) -> Node {
        let cause = if self.enabled {
            OfflineCause::disconnected()
        } else {
            OfflineCause::new("administratively disabled", "registry")
        };
        Node {
            name: self.name.clone(),
            agent_url: self.url.clone(),
            channel: None,
            label_string: self.labels.clone(),
            dynamic_labels: self.dynamic_labels.iter().cloned().collect::<LabelSet>(),
            description: self.description.clone(),
            launch_mode: self.launch,
            enabled: self.enabled,
            connecting: false,
            connected_since: None,
            state: Connectivity::Offline { cause },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MonitorConfig {
    NodeProperty {
        #[serde(default)]
        id: Option<String>,
        #[serde(flatten)]
        check: CheckSpec,
        #[serde(default)]
        ignored: bool,
        #[serde(default = "default_property_position")]
        position: i32,
    },
    NodeInfo {
        #[serde(default)]
        id: Option<String>,
        #[serde(flatten)]
        settings: InfoSettings,
    },
    NodeStatus {
        #[serde(default)]
        id: Option<String>,
    },
}

fn default_property_position() -> i32 {
    property::DEFAULT_POSITION
}

impl MonitorConfig {
    pub fn kind(&self) -> MonitorKind {
        match self {
            Self::NodeProperty { .. } => MonitorKind::NodeProperty,
            Self::NodeInfo { .. } => MonitorKind::NodeInfo,
            Self::NodeStatus { .. } => MonitorKind::NodeStatus,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::NodeProperty { id, .. } | Self::NodeInfo { id, .. } | Self::NodeStatus { id } => {
                id.as_deref()
            }
        }
    }
}

/// Load configuration from `path` (or the default location), then apply
/// `NODEWATCH_*` environment overrides (`__` separates nested keys).
pub fn load(path: Option<&Path>) -> Result<Config> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (Config::path()?, false),
    };

    let mut figment = Figment::new();
    if path.exists() {
        figment = figment.merge(Yaml::file(&path));
    } else if explicit {
        bail!("config file {} does not exist", path.display());
    }

    figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .with_context(|| format!("loading config from {}", path.display()))
}
