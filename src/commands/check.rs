//! `nodewatch check`: one local poll cycle over the configured fleet.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use crate::config;
use crate::domain::launcher::AgentLauncher;
use crate::domain::monitor_service::MonitorService;
use crate::domain::verdict::Verdict;
use crate::monitors::MonitorData;

pub fn run(config_path: Option<&Path>) -> Result<()> {
    let cfg = config::load(config_path)?;

    // Human-readable logs on stderr; the table goes to stdout
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.daemon.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Runtime::new()?;
    let unhealthy = runtime.block_on(async {
        let svc = MonitorService::from_config(&cfg).await?;
        let launcher = AgentLauncher::new(Duration::from_secs(cfg.daemon.probe_timeout_secs))?;
        launcher.launch_disconnected(svc.registry()).await;
        let summaries = svc.poll_all().await;

        println!("{}", "nodewatch check".bold());
        let columns = svc.columns();
        for node in svc.registry().names().await {
            let cells: Vec<String> = svc
                .node_data(&node)
                .await
                .iter()
                .map(|v| format!("{}: {}", v.column.name, cell(&v.data)))
                .collect();
            println!("  {:<16} {}", node.bold(), cells.join("  "));
        }
        if columns.is_empty() {
            println!("  no monitors configured");
        }

        anyhow::Ok(summaries.iter().map(|s| s.unhealthy).sum::<u32>())
    })?;

    if unhealthy > 0 {
        println!("  {} {}", unhealthy, "unhealthy".red());
        std::process::exit(1);
    }
    Ok(())
}

/// Render one column value for the terminal.
pub fn cell(data: &MonitorData) -> String {
    match data {
        MonitorData::Property(result) => {
            let value = result.value.clone().unwrap_or_else(|| "-".to_string());
            match result.verdict {
                Verdict::Healthy => value.green().to_string(),
                Verdict::Unhealthy => value.red().to_string(),
                Verdict::Indeterminate => value.dimmed().to_string(),
            }
        }
        MonitorData::Info(info) => {
            let mut text = info.allowed_labels().to_string();
            let hidden = info.all_labels().len() - info.allowed_labels().len();
            if hidden > 0 {
                text.push_str(&format!(" (+{})", hidden));
            }
            text
        }
        MonitorData::Status(status) => match &status.offline_cause {
            None if status.online => "online".green().to_string(),
            Some(cause) => format!("{} ({})", "offline".red(), cause),
            None => "offline".red().to_string(),
        },
    }
}
