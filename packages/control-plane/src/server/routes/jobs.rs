use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use je_engine::ids::{ClusterId, DeploymentId, JobId, MachineId};
use je_engine::{
    Admission, CallConfig, ClaimedJob, Deployment, Dispatcher, FunctionDeclaration, JobStatus, ResultSink,
    ResultType, RetryConfig, Status,
};
use je_protocol::{
    ClaimedJobWire, CreateJobRequest, CreateJobResponse, GetJobStatusesRequest, GetJobStatusesResponse,
    JobStatusEntry, JobStatusResponse, JobStatusWire, JobsRequestRequest, PackedBytes, PersistJobResultRequest,
    ResultTypeWire,
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::server::app::AppState;
use crate::server::middleware::{AuthenticatedCluster, ClientIp};

fn status_to_wire(status: JobStatus) -> JobStatusWire {
    match status {
        JobStatus::Pending => JobStatusWire::Pending,
        JobStatus::Running => JobStatusWire::Running,
        JobStatus::Success => JobStatusWire::Success,
        JobStatus::Failure => JobStatusWire::Failure,
    }
}

fn result_type_to_wire(result_type: ResultType) -> ResultTypeWire {
    match result_type {
        ResultType::Resolution => ResultTypeWire::Resolution,
        ResultType::Rejection => ResultTypeWire::Rejection,
    }
}

fn result_type_from_wire(result_type: ResultTypeWire) -> ResultType {
    match result_type {
        ResultTypeWire::Resolution => ResultType::Resolution,
        ResultTypeWire::Rejection => ResultType::Rejection,
    }
}

/// POST /jobs.
pub async fn create_job(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedCluster>,
    Json(request): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<CreateJobResponse>), ApiError> {
    let cluster_id: ClusterId = auth.cluster.id;

    let deployment_id = Deployment::find_active(cluster_id, &request.service, &state.db)
        .await?
        .map(|deployment| deployment.id);

    let call_config = CallConfig {
        idempotency_key: request.call_config.idempotency_key,
        cache_key: request.call_config.cache_key,
        cache_ttl_seconds: request.call_config.cache_ttl_seconds,
        retry_count_on_stall: request.call_config.retry_count_on_stall,
        timeout_seconds: request.call_config.timeout_seconds,
        predictive_retries_on_rejection: request.call_config.predictive_retries_on_rejection,
        execution_id: request.call_config.execution_id.map(JobId::from),
    };

    let job_id = Admission::create_job(
        cluster_id,
        &request.service,
        &request.target_fn,
        request.target_args.into(),
        deployment_id,
        call_config,
        &state.db,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(CreateJobResponse { id: job_id.into_uuid() })))
}

/// POST /jobs-request.
pub async fn jobs_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedCluster>,
    client_ip: Option<Extension<ClientIp>>,
    Json(request): Json<JobsRequestRequest>,
) -> Result<Json<Vec<ClaimedJobWire>>, ApiError> {
    let machine_id: MachineId = request.machine_id.into();
    let deployment_id = request.deployment_id.map(DeploymentId::from);
    let ip = client_ip.map(|Extension(ip)| ip.0.to_string());

    let functions = if request.functions.is_empty() {
        None
    } else {
        Some(
            request
                .functions
                .into_iter()
                .map(|declaration| FunctionDeclaration {
                    name: declaration.name,
                    idempotent: declaration.idempotent,
                    rate: declaration.rate,
                    cache_ttl_seconds: declaration.cache_ttl_seconds,
                    retry_config: declaration
                        .retry_count_on_stall
                        .map(|retry_count_on_stall| RetryConfig { retry_count_on_stall }),
                })
                .collect::<Vec<_>>(),
        )
    };

    let claimed: Vec<ClaimedJob> = Dispatcher::next_jobs(
        auth.cluster.id,
        &request.service,
        request.limit,
        machine_id,
        ip,
        deployment_id,
        functions.as_deref(),
        &state.db,
    )
    .await?;

    let wire = claimed
        .into_iter()
        .map(|job| ClaimedJobWire {
            id: job.id.into_uuid(),
            target_fn: job.target_fn,
            target_args: job.target_args.into(),
        })
        .collect();

    Ok(Json(wire))
}

/// GET /jobs/:id.
pub async fn get_job_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedCluster>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let view = Status::get_job_status(auth.cluster.id, JobId::from(id), &state.db).await?;

    Ok(Json(JobStatusResponse {
        status: status_to_wire(view.status),
        result: view.result.map(PackedBytes::from),
        result_type: view.result_type.map(result_type_to_wire),
    }))
}

/// POST /jobs/:id/result.
pub async fn persist_job_result(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedCluster>,
    Path(id): Path<Uuid>,
    Json(request): Json<PersistJobResultRequest>,
) -> Result<StatusCode, ApiError> {
    let result: Vec<u8> = request.result.into();

    ResultSink::persist_job_result(
        JobId::from(id),
        auth.cluster.id,
        &result,
        result_type_from_wire(request.result_type),
        request.function_execution_time_ms,
        &state.db,
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /jobs/statuses — batched `getJobStatuses` (§4.4, §4.9).
pub async fn get_job_statuses(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedCluster>,
    Json(request): Json<GetJobStatusesRequest>,
) -> Result<Json<GetJobStatusesResponse>, ApiError> {
    let job_ids: Vec<JobId> = request.job_ids.into_iter().map(JobId::from).collect();
    let timeout = request
        .long_poll_timeout_ms
        .unwrap_or(je_engine::status::DEFAULT_LONG_POLL_MS);

    let views = Status::get_job_statuses(auth.cluster.id, &job_ids, timeout, &state.db).await?;

    let jobs = views
        .into_iter()
        .map(|view| JobStatusEntry {
            id: view.id.into_uuid(),
            status: JobStatusResponse {
                status: status_to_wire(view.status),
                result: view.result.map(PackedBytes::from),
                result_type: view.result_type.map(result_type_to_wire),
            },
        })
        .collect();

    Ok(Json(GetJobStatusesResponse { jobs }))
}
