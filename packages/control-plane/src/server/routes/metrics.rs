use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::Json;
use je_protocol::MetricsEventRequest;

use crate::server::app::AppState;
use crate::server::middleware::AuthenticatedCluster;

/// POST /metrics — event ingest (§1 non-goals: "we treat the event sink as a
/// write-only stream"). Real metrics storage is an external collaborator's
/// concern; the control plane's job here is to accept and log the event.
pub async fn ingest(
    State(_state): State<AppState>,
    Extension(auth): Extension<AuthenticatedCluster>,
    Json(event): Json<MetricsEventRequest>,
) -> StatusCode {
    tracing::info!(
        cluster_id = %auth.cluster.id,
        tag = %event.tag,
        job_id = ?event.job_id,
        machine_id = ?event.machine_id,
        deployment_id = ?event.deployment_id,
        payload = %event.payload,
        "metrics event received",
    );

    StatusCode::NO_CONTENT
}
