use anyhow::{Context, Result};
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::api::graphql::{self, NodewatchSchema};
use crate::api::rest::{self, AppState};
use crate::config::Config;
use crate::domain::launcher::AgentLauncher;
use crate::domain::monitor_service::{MonitorService, PollSummary};

pub async fn run(config: Config) -> Result<()> {
    let daemon = &config.daemon;

    // Init tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&daemon.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "nodewatch daemon starting");

    let monitors = MonitorService::from_config(&config).await?;
    let launcher = Arc::new(AgentLauncher::new(Duration::from_secs(
        daemon.probe_timeout_secs,
    ))?);

    let app_state = AppState {
        monitors: monitors.clone(),
    };

    // Build GraphQL schema
    let schema = graphql::build_schema(monitors.clone());

    let graphql_router = Router::new()
        .route("/graphql", get(graphql_playground).post(graphql_handler))
        .with_state(schema);

    let app = rest::router(app_state)
        .merge(graphql_router)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let http_addr = &daemon.http_addr;
    let listener = TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("binding to {}", http_addr))?;

    info!(addr = %http_addr, "HTTP server listening");

    // Attach channels, then poll in the background; the daemon serves immediately
    {
        let monitors = monitors.clone();
        let launcher = launcher.clone();
        let interval_secs = daemon.poll_interval_secs;
        tokio::spawn(async move {
            let connected = launcher.launch_disconnected(monitors.registry()).await;
            info!(connected, "initial launch completed");

            if interval_secs == 0 {
                log_cycle(&monitors.poll_all().await);
                return;
            }
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                log_cycle(&monitors.poll_all().await);
            }
        });
    }

    // Spawn reconnect loop
    if daemon.reconnect_interval_secs > 0 {
        let monitors = monitors.clone();
        let launcher = launcher.clone();
        let interval_secs = daemon.reconnect_interval_secs;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            // The initial launch covers the first tick
            interval.tick().await;
            loop {
                interval.tick().await;
                launcher.verify_connected(monitors.registry()).await;
                let connected = launcher.launch_disconnected(monitors.registry()).await;
                if connected == 0 {
                    debug!("reconnect pass attached no channels");
                }
            }
        });
    }

    // Run HTTP server with graceful shutdown
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("nodewatch daemon stopped");
    Ok(())
}

fn log_cycle(summaries: &[PollSummary]) {
    for s in summaries {
        let unhealthy = if s.ignored { 0 } else { s.unhealthy };
        if s.skipped > 0 || unhealthy > 0 {
            warn!(
                monitor = %s.monitor_id,
                kind = ?s.kind,
                polled = s.polled,
                skipped = s.skipped,
                unhealthy = s.unhealthy,
                "poll cycle completed with problems"
            );
        } else {
            info!(
                monitor = %s.monitor_id,
                polled = s.polled,
                healthy = s.healthy,
                "poll cycle completed"
            );
        }
    }
}

async fn graphql_playground() -> Html<String> {
    Html(
        async_graphql::http::playground_source(
            async_graphql::http::GraphQLPlaygroundConfig::new("/graphql"),
        ),
    )
}

async fn graphql_handler(
    State(schema): State<NodewatchSchema>,
    req: GraphQLRequest,
) -> GraphQLResponse {
    schema.execute(req.into_inner()).await.into()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("Received Ctrl+C, shutting down"); },
        _ = terminate => { info!("Received SIGTERM, shutting down"); },
    }
}
