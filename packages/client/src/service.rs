//! Client-side service descriptor (§9 design note: "model the client as an
//! explicit `Service` descriptor object with a `call(fn_name, args) → result`
//! operation").

use std::sync::Arc;
use std::time::Duration;

use je_protocol::{CallConfigWire, CreateJobRequest, CreateJobResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::codec::{Codec, JsonCodec};
use crate::error::ClientError;
use crate::results_poller::{JobOutcome, ResultsPoller};

#[derive(Debug, Clone, Default)]
pub struct CallConfig {
    pub idempotency_key: Option<String>,
    pub cache_key: Option<String>,
    pub cache_ttl_seconds: Option<i64>,
    pub retry_count_on_stall: Option<i32>,
    pub timeout_seconds: Option<i32>,
    pub predictive_retries_on_rejection: Option<bool>,
    /// Upper bound on how long `call` waits for the job to settle.
    pub call_timeout: Option<Duration>,
}

impl From<CallConfig> for CallConfigWire {
    fn from(config: CallConfig) -> Self {
        Self {
            idempotency_key: config.idempotency_key,
            cache_key: config.cache_key,
            cache_ttl_seconds: config.cache_ttl_seconds,
            retry_count_on_stall: config.retry_count_on_stall,
            timeout_seconds: config.timeout_seconds,
            predictive_retries_on_rejection: config.predictive_retries_on_rejection,
            execution_id: None,
        }
    }
}

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// A named collection of remotely invokable functions, bound to one cluster.
pub struct Service {
    base_url: String,
    cluster_secret: String,
    name: String,
    http: reqwest::Client,
    poller: Arc<ResultsPoller>,
    codec: Arc<dyn Codec>,
}

impl Service {
    pub fn new(base_url: impl Into<String>, cluster_secret: impl Into<String>, name: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let cluster_secret = cluster_secret.into();
        let http = reqwest::Client::new();
        let poller = ResultsPoller::start(http.clone(), base_url.clone(), cluster_secret.clone());

        Self {
            base_url,
            cluster_secret,
            name: name.into(),
            http,
            poller,
            codec: Arc::new(JsonCodec),
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Call a remote function by name and await its result. `fn_name` stands
    /// in for the generated typed method a code-generation layer would
    /// provide on top of this descriptor.
    pub async fn call<A, R>(&self, fn_name: &str, args: &A, call_config: CallConfig) -> Result<R, ClientError>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let timeout = call_config.call_timeout.unwrap_or(DEFAULT_CALL_TIMEOUT);

        let target_args = self
            .codec
            .encode(args)
            .map_err(|err| ClientError::UnexpectedError(err.to_string()))?;

        let request = CreateJobRequest {
            service: self.name.clone(),
            target_fn: fn_name.to_string(),
            target_args,
            call_config: call_config.into(),
        };

        let response: CreateJobResponse = self
            .http
            .post(format!("{}/jobs", self.base_url))
            .bearer_auth(&self.cluster_secret)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let receiver = self.poller.watch(response.id).await;

        let outcome = tokio::time::timeout(timeout, receiver)
            .await
            .map_err(|_| ClientError::JobTimeout)?
            .map_err(|_| ClientError::TooManyNetworkErrors)?;

        match outcome {
            JobOutcome::Resolution(bytes) => self
                .codec
                .decode(&bytes)
                .map_err(|err| ClientError::UnexpectedError(err.to_string())),
            JobOutcome::Rejection(bytes) => Err(ClientError::Rejection(String::from_utf8_lossy(&bytes.0).into_owned())),
        }
    }

    /// Fire-and-forget variant: admits the job and returns its id without
    /// waiting for a result.
    pub async fn call_async<A>(&self, fn_name: &str, args: &A, call_config: CallConfig) -> Result<Uuid, ClientError>
    where
        A: Serialize,
    {
        let target_args = self
            .codec
            .encode(args)
            .map_err(|err| ClientError::UnexpectedError(err.to_string()))?;

        let request = CreateJobRequest {
            service: self.name.clone(),
            target_fn: fn_name.to_string(),
            target_args,
            call_config: call_config.into(),
        };

        let response: CreateJobResponse = self
            .http
            .post(format!("{}/jobs", self.base_url))
            .bearer_auth(&self.cluster_secret)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.id)
    }

    pub async fn shutdown(&self) {
        self.poller.stop().await;
    }
}
