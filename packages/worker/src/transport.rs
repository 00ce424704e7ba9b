//! HTTP transport to the control plane. A thin reqwest wrapper; retry/back-off
//! policy lives in the polling agent, not here (§4.8).

use je_protocol::{
    ClaimedJobWire, JobsRequestRequest, PersistJobResultRequest,
};
use uuid::Uuid;

use crate::error::WorkerError;

pub struct Transport {
    client: reqwest::Client,
    base_url: String,
    cluster_secret: String,
}

impl Transport {
    pub fn new(base_url: impl Into<String>, cluster_secret: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            cluster_secret: cluster_secret.into(),
        }
    }

    /// POST /jobs-request. Returns `Unauthorized` on 401 (§4.8 step 5, fatal).
    pub async fn jobs_request(&self, request: &JobsRequestRequest) -> Result<Vec<ClaimedJobWire>, WorkerError> {
        let response = self
            .client
            .post(format!("{}/jobs-request", self.base_url))
            .bearer_auth(&self.cluster_secret)
            .header("x-machine-id", request.machine_id.to_string())
            .json(request)
            .send()
            .await?;

        if response.status().as_u16() == 401 {
            return Err(WorkerError::Unauthorized);
        }

        let jobs = response.error_for_status()?.json().await?;
        Ok(jobs)
    }

    /// POST /jobs/:id/result.
    pub async fn persist_job_result(
        &self,
        job_id: Uuid,
        request: &PersistJobResultRequest,
    ) -> Result<(), WorkerError> {
        self.client
            .post(format!("{}/jobs/{job_id}/result", self.base_url))
            .bearer_auth(&self.cluster_secret)
            .json(request)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
