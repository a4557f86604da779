//! `nodewatch query`: query a nodewatch daemon via its REST API.

use std::path::Path;

use anyhow::{bail, Result};
use clap::Subcommand;

use crate::client::NodewatchClient;
use crate::config;

#[derive(Subcommand)]
pub enum QueryCommands {
    /// Daemon health check
    Health,
    /// All registered nodes
    Nodes,
    /// One node with its latest column values
    Node { name: String },
    /// Label columns for a node
    Labels {
        name: String,
        /// Labels shown in the bounded column; negative shows all
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        max: i32,
        /// Leave out labels reported by the agent
        #[arg(long)]
        static_only: bool,
    },
    /// Administratively enable a node
    Enable { name: String },
    /// Administratively disable a node (takes it offline)
    Disable { name: String },
    /// Column descriptors in display order
    Columns,
    /// Latest results of one monitor
    Results { monitor: String },
    /// Trigger a poll cycle of one monitor, or all of them
    Poll { monitor: Option<String> },
}

pub fn run(
    config_path: Option<&Path>,
    url: Option<&str>,
    format: &str,
    command: &QueryCommands,
) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_async(config_path, url, format, command))
}

async fn run_async(
    config_path: Option<&Path>,
    url: Option<&str>,
    format: &str,
    command: &QueryCommands,
) -> Result<()> {
    let cfg = config::load(config_path)?;
    let client = NodewatchClient::from_config(url, &cfg)?;

    match command {
        QueryCommands::Health => {
            let data = client.health().await?;
            print_output(format, &data)
        }
        QueryCommands::Nodes => {
            let data = client.nodes().await?;
            print_output(format, &data)
        }
        QueryCommands::Node { name } => {
            let data = client.node(name).await?;
            print_output(format, &data)
        }
        QueryCommands::Labels {
            name,
            max,
            static_only,
        } => {
            let data = client.labels(name, *max, !static_only).await?;
            print_output(format, &data)
        }
        QueryCommands::Enable { name } => {
            let data = client.set_enabled(name, true).await?;
            print_output(format, &data)
        }
        QueryCommands::Disable { name } => {
            let data = client.set_enabled(name, false).await?;
            print_output(format, &data)
        }
        QueryCommands::Columns => {
            let data = client.columns().await?;
            print_output(format, &data)
        }
        QueryCommands::Results { monitor } => {
            let data = client.results(monitor).await?;
            print_output(format, &data)
        }
        QueryCommands::Poll { monitor } => {
            let data = client.poll(monitor.as_deref()).await?;
            print_output(format, &data)
        }
    }
}

fn print_output<T: serde::Serialize>(format: &str, data: &T) -> Result<()> {
    match format {
        "json" => {
            let json = serde_json::to_string_pretty(data)?;
            println!("{}", json);
        }
        "yaml" => {
            print!("{}", serde_yaml::to_string(data)?);
        }
        "table" => {
            let value = serde_json::to_value(data)?;
            let mut lines = Vec::new();
            render(&value, 0, &mut lines);
            for line in lines {
                println!("{}", line);
            }
        }
        other => bail!("unknown output format '{}' (expected table, json or yaml)", other),
    }
    Ok(())
}

/// Indented key-value rendering of a JSON tree. Scalar arrays stay on one line.
fn render(value: &serde_json::Value, indent: usize, out: &mut Vec<String>) {
    let pad = "  ".repeat(indent);
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                match val {
                    serde_json::Value::Object(inner) if inner.is_empty() => {
                        out.push(format!("{}{}: {{}}", pad, key));
                    }
                    serde_json::Value::Object(_) => {
                        out.push(format!("{}{}:", pad, key));
                        render(val, indent + 1, out);
                    }
                    serde_json::Value::Array(arr) if is_flat(arr) => {
                        let items: Vec<String> = arr.iter().map(format_scalar).collect();
                        out.push(format!("{}{}: {}", pad, key, items.join(", ")));
                    }
                    serde_json::Value::Array(_) => {
                        out.push(format!("{}{}:", pad, key));
                        render(val, indent + 1, out);
                    }
                    _ => out.push(format!("{}{}: {}", pad, key, format_scalar(val))),
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for (i, item) in arr.iter().enumerate() {
                if item.is_object() || item.is_array() {
                    out.push(format!("{}[{}]:", pad, i));
                    render(item, indent + 1, out);
                } else {
                    out.push(format!("{}- {}", pad, format_scalar(item)));
                }
            }
        }
        _ => out.push(format!("{}{}", pad, format_scalar(value))),
    }
}

fn is_flat(arr: &[serde_json::Value]) -> bool {
    arr.iter().all(|v| !v.is_object() && !v.is_array())
}

fn format_scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}
