use anyhow::{Context, Result};
use control_plane::server::build_app;
use control_plane::Config;
use je_engine::SelfHealer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,control_plane=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting control plane");

    let config = Config::from_env().context("failed to load configuration")?;
    tracing::info!("configuration loaded");

    tracing::info!("connecting to database...");
    let pool = config.engine.connect().await?;
    tracing::info!("database connected");

    tracing::info!("running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;
    tracing::info!("migrations complete");

    SelfHealer::spawn(pool.clone());

    // Wake-up notifications are not wired by default: no `DeploymentProvider`
    // ships in this workspace (S3/Lambda provisioning is an external
    // collaborator's concern, §1). A host embedding a concrete provider would
    // spawn a loop calling `WakeupNotifier::check_and_notify` per `(cluster,
    // service)` here.

    let app = build_app(pool, config.allowed_origins);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(%addr, "starting server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("failed to bind to address")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}
