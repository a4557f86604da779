mod api;
mod client;
mod commands;
mod config;
mod domain;
mod monitors;
mod server;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "nodewatch", version, about = "Fleet node monitor with tri-state property checks")]
struct Cli {
    /// Path to config file (default: ~/.config/nodewatch/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the nodewatch daemon (poll loop + REST + GraphQL)
    Daemon {
        /// HTTP listen address (overrides config)
        #[arg(long)]
        http_addr: Option<String>,

        /// Log level (overrides config)
        #[arg(long)]
        log_level: Option<String>,
    },

    /// Run one poll cycle locally and print every node's columns
    Check,

    /// Show label columns for a configured node
    Labels {
        /// Node name
        name: String,

        /// Labels shown in the bounded column; negative shows all
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        max: i32,

        /// Include dynamic labels from config
        #[arg(long)]
        dynamic: bool,
    },

    /// Query a nodewatch daemon's REST API
    Query {
        /// Daemon base URL (defaults to daemon_url from config)
        #[arg(long, global = true)]
        url: Option<String>,

        /// Output format (table, json or yaml)
        #[arg(long, global = true, default_value = "table")]
        format: String,

        #[command(subcommand)]
        command: commands::query::QueryCommands,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Daemon {
            http_addr,
            log_level,
        } => commands::daemon::run(http_addr, log_level, config),
        Commands::Check => commands::check::run(config),
        Commands::Labels { name, max, dynamic } => {
            commands::labels::run(config, &name, max, dynamic)
        }
        Commands::Query {
            url,
            format,
            command,
        } => commands::query::run(config, url.as_deref(), &format, &command),
    }
}
