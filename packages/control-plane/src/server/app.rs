//! Application setup and server configuration.

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use sqlx::PgPool;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::server::middleware::{cluster_auth_middleware, extract_client_ip};
use crate::server::routes::{deployments, health, jobs, metrics};

/// Shared application state. The engine crate owns all persistence; the control
/// plane only needs the pool to hand to it.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
}

/// Build the Axum application router.
///
/// `/live` is unauthenticated. Everything else requires the `Authorization:
/// Bearer <cluster secret>` header that `cluster_auth_middleware` checks (§6).
pub fn build_app(db: PgPool, allowed_origins: Vec<String>) -> Router {
    let state = AppState { db };

    let rate_limit_config = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .use_headers()
            .finish()
            .expect("rate limiter configuration is valid and should never fail"),
    );

    let protected = Router::new()
        .route("/jobs", post(jobs::create_job))
        .route("/jobs-request", post(jobs::jobs_request))
        .route("/jobs/statuses", post(jobs::get_job_statuses))
        .route("/jobs/:id", get(jobs::get_job_status))
        .route("/jobs/:id/result", post(jobs::persist_job_result))
        .route("/metrics", post(metrics::ingest))
        .route(
            "/clusters/:cluster_id/service/:service/deployments",
            post(deployments::create_deployment),
        )
        .route(
            "/clusters/:cluster_id/service/:service/deployments/:id/release",
            post(deployments::release_deployment),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), cluster_auth_middleware))
        .layer(GovernorLayer {
            config: rate_limit_config,
        });

    let cors = if allowed_origins.is_empty() {
        CorsLayer::new().allow_origin(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    }
    .allow_methods([Method::GET, Method::POST])
    .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/live", get(health::live))
        .merge(protected)
        .layer(middleware::from_fn(extract_client_ip))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
