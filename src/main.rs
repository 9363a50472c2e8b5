// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Binary entry point: resolve the container-platform socket, wire the
//! registry/router/hardening/discovery/orchestrator stack, and serve HTTP
//! until shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use bollard::Docker;
use clap::Parser;
use tracing::{error, info};

use mcp_orchestrator::application::hardening::Hardening;
use mcp_orchestrator::application::orchestrator::Orchestrator;
use mcp_orchestrator::config::Config;
use mcp_orchestrator::infrastructure::discovery::Discovery;
use mcp_orchestrator::infrastructure::docker_socket;
use mcp_orchestrator::infrastructure::event_bus::EventBus;
use mcp_orchestrator::infrastructure::registry::Registry;
use mcp_orchestrator::infrastructure::router::Router;
use mcp_orchestrator::presentation::http;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    init_logging(&config.log_level)?;

    let socket_path = docker_socket::resolve_socket_path()
        .await
        .context("failed to resolve a rootless container-platform socket")?;
    let docker = Docker::connect_with_unix(
        &socket_path.to_string_lossy(),
        120,
        bollard::API_DEFAULT_VERSION,
    )
    .with_context(|| format!("failed to connect to container platform at {}", socket_path.display()))?;
    docker.ping().await.context("container platform did not respond to ping")?;

    let registry = Arc::new(Registry::new(config.registry_config()));
    registry.restore().await.context("failed to restore persisted registry state")?;

    let event_bus = EventBus::new();
    let router = Arc::new(Router::new(config.router_config()));
    let hardening = Arc::new(Hardening::new(config.hardening_config(), event_bus.clone()));
    let discovery = Arc::new(Discovery::new(docker, config.discovery_config(), event_bus.clone()));

    let orchestrator = Arc::new(Orchestrator::new(
        registry.clone(),
        router,
        hardening,
        event_bus,
        discovery.clone(),
        config.tool_policy(),
    ));
    tokio::spawn(orchestrator.clone().run_event_loop());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let discovery_task = {
        let discovery = discovery.clone();
        tokio::spawn(async move { discovery.run(shutdown_rx).await })
    };

    let persist_task = {
        let registry = registry.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(30));
            loop {
                ticker.tick().await;
                if let Err(err) = registry.persist().await {
                    error!(error = %err, "failed to persist registry snapshot");
                }
            }
        })
    };

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "mcp orchestrator listening");

    let app = http::app(orchestrator);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    let _ = shutdown_tx.send(true);
    discovery_task.abort();
    persist_task.abort();
    if let Err(err) = registry.persist().await {
        error!(error = %err, "failed to persist registry state on shutdown");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
