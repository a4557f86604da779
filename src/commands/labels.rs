//! `nodewatch labels`: label columns for a configured node, without a daemon.

use std::path::Path;

use anyhow::{Context, Result};

use crate::config;
use crate::domain::types::LabelView;

pub fn run(config_path: Option<&Path>, name: &str, max: i32, dynamic: bool) -> Result<()> {
    let cfg = config::load(config_path)?;
    let node = cfg
        .nodes
        .iter()
        .find(|n| n.name == name)
        .with_context(|| {
            let known: Vec<_> = cfg.nodes.iter().map(|n| n.name.as_str()).collect();
            format!(
                "node '{}' not found in config. Available nodes: {}",
                name,
                if known.is_empty() {
                    "(none configured)".to_string()
                } else {
                    known.join(", ")
                }
            )
        })?
        .to_node();

    let view = LabelView::new(&node, dynamic, max);
    println!("allowed: {}", view.allowed.join(" "));
    println!("all:     {}", view.all.join(" "));
    Ok(())
}
