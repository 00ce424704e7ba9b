//! Standalone worker process entry point. Registers no functions of its own —
//! hosting applications are expected to depend on `je_worker` as a library and
//! build their own binary around `FunctionRegistry::register` + `PollingAgent`.
//! This binary exists to exercise the wiring (config, registry, polling agent,
//! graceful shutdown) end to end.

use std::sync::Arc;

use anyhow::{Context, Result};
use je_worker::{FunctionRegistry, PollingAgent, WorkerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,je_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting worker");

    let config = WorkerConfig::from_env().context("failed to load worker configuration")?;
    let service = config.service.clone();
    let registry = Arc::new(FunctionRegistry::new());

    let agent = Arc::new(PollingAgent::new(config, service, registry));

    let run_handle = tokio::spawn(agent.clone().run());

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    tracing::info!("shutdown signal received, draining in-flight tasks");
    agent.quit().await;
    run_handle.await.context("polling agent task panicked")?;

    tracing::info!("worker stopped");
    Ok(())
}
