//! Bearer-token cluster authentication plus `x-machine-id` extraction for
//! worker-originated requests (§6).

use axum::extract::{Request, State};
use axum::http::{header::AUTHORIZATION, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use je_engine::Cluster;
use sqlx::PgPool;
use uuid::Uuid;

use crate::server::app::AppState;

#[derive(Clone)]
pub struct AuthenticatedCluster {
    pub cluster: Cluster,
    pub machine_id: Option<Uuid>,
}

pub async fn cluster_auth_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, StatusCode> {
    let secret = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let cluster = authenticate(secret, &state.db).await?;

    let machine_id = request
        .headers()
        .get("x-machine-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok());

    request
        .extensions_mut()
        .insert(AuthenticatedCluster { cluster, machine_id });

    Ok(next.run(request).await)
}

async fn authenticate(secret: &str, db: &PgPool) -> Result<Cluster, StatusCode> {
    Cluster::find_by_secret(secret, db)
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)
}
