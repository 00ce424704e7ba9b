use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use je_engine::ids::{ClusterId, DeploymentId};
use je_engine::record::Record;
use je_engine::{Deployment, DeploymentStatus, EngineError};
use je_protocol::{CreateDeploymentResponse, DeploymentResponse, DeploymentStatusWire};
use uuid::Uuid;

use crate::error::ApiError;
use crate::server::app::AppState;
use crate::server::middleware::AuthenticatedCluster;

fn status_to_wire(status: DeploymentStatus) -> DeploymentStatusWire {
    match status {
        DeploymentStatus::Uploading => DeploymentStatusWire::Uploading,
        DeploymentStatus::Ready => DeploymentStatusWire::Ready,
        DeploymentStatus::Active => DeploymentStatusWire::Active,
        DeploymentStatus::Inactive => DeploymentStatusWire::Inactive,
    }
}

fn require_own_cluster(auth: &AuthenticatedCluster, cluster_id: Uuid) -> Result<ClusterId, ApiError> {
    if auth.cluster.id.into_uuid() != cluster_id {
        return Err(EngineError::Forbidden.into());
    }
    Ok(auth.cluster.id)
}

/// POST /clusters/:cluster_id/service/:service/deployments.
///
/// Bundle packaging and the real upload URL are an external collaborator's
/// concern (§1 non-goals: "S3 upload of bundles"); the deployment row starts
/// life in `uploading` and the caller is expected to PUT its bundle at
/// `packageUploadUrl` before marking it ready through that collaborator.
pub async fn create_deployment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedCluster>,
    Path((cluster_id, service)): Path<(Uuid, String)>,
) -> Result<(StatusCode, Json<CreateDeploymentResponse>), ApiError> {
    let cluster_id = require_own_cluster(&auth, cluster_id)?;

    let deployment = Deployment::builder().cluster_id(cluster_id).service(service).build();
    let deployment = deployment.insert(&state.db).await?;

    Ok((
        StatusCode::OK,
        Json(CreateDeploymentResponse {
            id: deployment.id.into_uuid(),
            package_upload_url: String::new(),
            status: status_to_wire(deployment.status),
        }),
    ))
}

/// POST /clusters/:cluster_id/service/:service/deployments/:id/release.
pub async fn release_deployment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedCluster>,
    Path((cluster_id, _service, id)): Path<(Uuid, String, Uuid)>,
) -> Result<Json<DeploymentResponse>, ApiError> {
    let cluster_id = require_own_cluster(&auth, cluster_id)?;

    let deployment = Deployment::release(DeploymentId::from(id), cluster_id, &state.db).await?;

    Ok(Json(DeploymentResponse {
        id: deployment.id.into_uuid(),
        status: status_to_wire(deployment.status),
    }))
}
