mod a2a;
mod bootstrap;
mod health;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use quarry_agent::Orchestrator;
use quarry_core::config::{AppConfig, LoadOptions};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

fn init_logging(config: &AppConfig) {
    use quarry_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut servers = Vec::new();

    for agent in &app.data_agents {
        let port = agent.config().port;
        let card = agent.card(&app.config.server.advertised_url(port));
        let router = a2a::router(card, agent.clone())
            .merge(health::readiness_router(agent.name(), app.db_pool.clone()));
        servers.push(
            serve(&app.config.server.bind_address, port, router, agent.name(), shutdown_rx.clone())
                .await?,
        );
    }

    let orchestrator_port = app.config.server.orchestrator_port;
    let orchestrator_card =
        Orchestrator::agent_card(&app.config.server.advertised_url(orchestrator_port));
    let orchestrator_router = a2a::router(orchestrator_card, app.orchestrator.clone());
    servers.push(
        serve(
            &app.config.server.bind_address,
            orchestrator_port,
            orchestrator_router,
            quarry_agent::orchestrator::ORCHESTRATOR_NAME,
            shutdown_rx.clone(),
        )
        .await?,
    );

    info!(
        event_name = "system.server.started",
        data_agents = app.data_agents.len(),
        orchestrator_port,
        "quarry-server started"
    );
    wait_for_shutdown().await?;
    info!(event_name = "system.server.stopping", "quarry-server stopping");

    let _ = shutdown_tx.send(true);
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    for server in servers {
        if tokio::time::timeout(grace, server).await.is_err() {
            warn!(
                event_name = "system.server.shutdown_timeout",
                grace_secs = grace.as_secs(),
                "server did not drain before the grace period elapsed"
            );
        }
    }
    app.db_pool.close().await;

    Ok(())
}

async fn serve(
    bind_address: &str,
    port: u16,
    router: Router,
    agent: &str,
    mut shutdown: watch::Receiver<bool>,
) -> Result<JoinHandle<()>> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {agent} on {address}"))?;

    info!(
        event_name = "system.server.listening",
        agent = %agent,
        bind_address = %address,
        "agent endpoint started"
    );

    let agent = agent.to_string();
    Ok(tokio::spawn(async move {
        let drain = async move {
            let _ = shutdown.wait_for(|stopping| *stopping).await;
        };
        if let Err(error) = axum::serve(listener, router).with_graceful_shutdown(drain).await {
            error!(
                event_name = "system.server.error",
                agent = %agent,
                error = %error,
                "agent server terminated unexpectedly"
            );
        }
    }))
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
