//! Wire DTOs for the HTTP/JSON control-plane surface (§6). Field names are
//! camelCase to match the JSON shapes the spec's route table describes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bytes::PackedBytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatusWire {
    Pending,
    Running,
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultTypeWire {
    Resolution,
    Rejection,
}

/// `call_config` options recognized by admission (§4.1 table).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallConfigWire {
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub cache_key: Option<String>,
    #[serde(default)]
    pub cache_ttl_seconds: Option<i64>,
    #[serde(default)]
    pub retry_count_on_stall: Option<i32>,
    #[serde(default)]
    pub timeout_seconds: Option<i32>,
    #[serde(default)]
    pub predictive_retries_on_rejection: Option<bool>,
    #[serde(default)]
    pub execution_id: Option<Uuid>,
}

/// POST /jobs request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub service: String,
    pub target_fn: String,
    pub target_args: PackedBytes,
    #[serde(default)]
    pub call_config: CallConfigWire,
}

/// POST /jobs 201 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobResponse {
    pub id: Uuid,
}

/// A function declaration carried in the `jobsRequest` registration projection
/// (§4.2, §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclarationWire {
    pub name: String,
    #[serde(default)]
    pub idempotent: bool,
    #[serde(default)]
    pub rate: Option<f64>,
    #[serde(default)]
    pub cache_ttl_seconds: Option<i64>,
    #[serde(default)]
    pub retry_count_on_stall: Option<i32>,
}

/// POST /jobs-request request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobsRequestRequest {
    pub service: String,
    pub limit: i64,
    pub machine_id: Uuid,
    /// Worker keepalive budget advertised by the poller (§4.8); the dispatcher does
    /// not itself long-poll (§4.2 "empty response"), so this is informational only.
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
    #[serde(default)]
    pub deployment_id: Option<Uuid>,
    #[serde(default)]
    pub functions: Vec<FunctionDeclarationWire>,
}

/// One entry of the `jobsRequest` 200 response (§6 route table).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimedJobWire {
    pub id: Uuid,
    pub target_fn: String,
    pub target_args: PackedBytes,
}

/// GET /jobs/:id 200 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub status: JobStatusWire,
    #[serde(default)]
    pub result: Option<PackedBytes>,
    #[serde(default)]
    pub result_type: Option<ResultTypeWire>,
}

/// POST /jobs/:id/result request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistJobResultRequest {
    pub result: PackedBytes,
    pub result_type: ResultTypeWire,
    #[serde(default)]
    pub function_execution_time_ms: Option<i64>,
}

/// POST batch status query, not individually named in §6 but implied by §4.4's
/// `getJobStatuses`; served as the request body on a dedicated batch route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetJobStatusesRequest {
    pub job_ids: Vec<Uuid>,
    #[serde(default)]
    pub long_poll_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusEntry {
    pub id: Uuid,
    #[serde(flatten)]
    pub status: JobStatusResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetJobStatusesResponse {
    pub jobs: Vec<JobStatusEntry>,
}

/// POST .../deployments response and release response share this shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatusWire {
    Uploading,
    Ready,
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeploymentResponse {
    pub id: Uuid,
    pub package_upload_url: String,
    pub status: DeploymentStatusWire,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResponse {
    pub id: Uuid,
    pub status: DeploymentStatusWire,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// POST /metrics request body — the event sink is a write-only stream (§1
/// non-goals); the control plane logs these rather than persisting them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsEventRequest {
    pub tag: String,
    #[serde(default)]
    pub job_id: Option<Uuid>,
    #[serde(default)]
    pub machine_id: Option<Uuid>,
    #[serde(default)]
    pub deployment_id: Option<Uuid>,
    #[serde(default)]
    pub payload: serde_json::Value,
}
