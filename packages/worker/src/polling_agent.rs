//! Worker Polling Agent (§4.8): the per-service long-poll loop, bounded concurrent
//! execution pool, retry/back-off, and idle shutdown.

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use je_protocol::{JobsRequestRequest, PersistJobResultRequest, ResultTypeWire};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::registry::FunctionRegistry;
use crate::task_queue::{TaskOutcome, TaskQueue};
use crate::transport::Transport;

const THROTTLE: Duration = Duration::from_millis(2_000);
const SHUTDOWN_SPIN: Duration = Duration::from_millis(500);
const MAX_CONSECUTIVE_ERRORS: u32 = 10;
const DEFAULT_CONCURRENCY: usize = 100;
const KEEPALIVE_TTL_SECONDS: u64 = 20;

/// Bounded-concurrency, long-poll loop for one service. Owns a `TaskQueue` and a
/// `Transport`; `concurrency` is tunable at runtime via `set_concurrency`.
pub struct PollingAgent {
    config: WorkerConfig,
    service: String,
    registry: Arc<FunctionRegistry>,
    transport: Arc<Transport>,
    task_queue: Mutex<TaskQueue>,
    current: Arc<AtomicUsize>,
    error_count: AtomicU32,
    idle_cycle_count: AtomicU32,
    max_idle_cycles: Option<u32>,
    polling_aborted: std::sync::atomic::AtomicBool,
    concurrency: AtomicI64,
    cancel: CancellationToken,
}

impl PollingAgent {
    pub fn new(config: WorkerConfig, service: impl Into<String>, registry: Arc<FunctionRegistry>) -> Self {
        let transport = Arc::new(Transport::new(config.control_plane_url.clone(), config.cluster_secret.clone()));
        let max_idle_cycles = config.max_idle_cycles();
        Self {
            service: service.into(),
            task_queue: Mutex::new(TaskQueue::new(DEFAULT_CONCURRENCY)),
            current: Arc::new(AtomicUsize::new(0)),
            error_count: AtomicU32::new(0),
            idle_cycle_count: AtomicU32::new(0),
            max_idle_cycles,
            polling_aborted: std::sync::atomic::AtomicBool::new(false),
            concurrency: AtomicI64::new(DEFAULT_CONCURRENCY as i64),
            cancel: CancellationToken::new(),
            config,
            registry,
            transport,
        }
    }

    /// Runtime-tunable concurrency cap (§4.8 `setConcurrency`).
    pub fn set_concurrency(&self, concurrency: i64) {
        self.concurrency.store(concurrency, Ordering::SeqCst);
    }

    /// `quit()`: abort in-flight transport calls, drain the task queue, then
    /// spin-wait until the loop observes the cancellation and flips
    /// `polling_aborted`.
    pub async fn quit(&self) {
        self.cancel.cancel();
        self.task_queue.lock().await.quit().await;
        while !self.polling_aborted.load(Ordering::SeqCst) {
            tokio::time::sleep(SHUTDOWN_SPIN).await;
        }
    }

    /// Run the poll loop until `quit()` is called or the agent self-terminates.
    pub async fn run(self: Arc<Self>) {
        info!(service = %self.service, "polling agent starting");

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let concurrency = self.concurrency.load(Ordering::SeqCst).max(0) as usize;
            let current = self.current.load(Ordering::SeqCst);

            if concurrency.saturating_sub(current) == 0 {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(THROTTLE) => continue,
                }
            }

            let limit = ((concurrency - current) as i64 + 1) / 2;
            let poll = self.poll_once(limit.max(1));
            let throttle = tokio::time::sleep(THROTTLE);

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = poll => {
                    match result {
                        Ok(should_stop) if should_stop => break,
                        Ok(_) => {}
                        Err(WorkerError::Unauthorized) => {
                            warn!(service = %self.service, "unauthorized, aborting polling agent");
                            break;
                        }
                        Err(err) => {
                            let errors = self.error_count.fetch_add(1, Ordering::SeqCst) + 1;
                            warn!(service = %self.service, error = %err, errors, "poll failed");
                            if errors >= MAX_CONSECUTIVE_ERRORS {
                                warn!(service = %self.service, "too many consecutive errors, aborting polling agent");
                                break;
                            }
                        }
                    }
                }
            }

            throttle.await;
        }

        self.polling_aborted.store(true, Ordering::SeqCst);
        info!(service = %self.service, "polling agent stopped");
    }

    /// One poll cycle. Returns `Ok(true)` if the agent should quit (idle shutdown).
    async fn poll_once(&self, limit: i64) -> Result<bool, WorkerError> {
        let request = JobsRequestRequest {
            service: self.service.clone(),
            limit,
            machine_id: self.config.machine_id,
            ttl_seconds: Some(KEEPALIVE_TTL_SECONDS),
            deployment_id: self.config.deployment_id,
            functions: self.registry.projection_for_service(&self.service),
        };

        let jobs = self.transport.jobs_request(&request).await?;
        self.error_count.store(0, Ordering::SeqCst);

        if jobs.is_empty() {
            let idle = self.idle_cycle_count.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(max_idle) = self.max_idle_cycles {
                if idle >= max_idle {
                    return Ok(true);
                }
            }
            return Ok(false);
        }
        self.idle_cycle_count.store(0, Ordering::SeqCst);

        for job in jobs {
            self.current.fetch_add(1, Ordering::SeqCst);

            let Some(entry) = self.registry.get(&job.target_fn) else {
                self.current.fetch_sub(1, Ordering::SeqCst);
                let transport = self.transport.clone();
                let job_id = job.id;
                tokio::spawn(async move {
                    let request = PersistJobResultRequest {
                        result: je_protocol::PackedBytes(b"Function was not registered".to_vec()),
                        result_type: ResultTypeWire::Rejection,
                        function_execution_time_ms: Some(0),
                    };
                    if let Err(err) = transport.persist_job_result(job_id, &request).await {
                        warn!(%job_id, error = %err, "failed to post rejection for unregistered function");
                    }
                });
                continue;
            };

            let transport = self.transport.clone();
            let job_id = job.id;
            let current = self.current.clone();

            let mut queue = self.task_queue.lock().await;
            let add_result = queue.add_task(entry.handler.clone(), job.target_args, move |outcome| {
                current.fetch_sub(1, Ordering::SeqCst);

                let (result, result_type, function_execution_time_ms) = match outcome {
                    TaskOutcome::Resolution {
                        content,
                        function_execution_time_ms,
                    } => (content, ResultTypeWire::Resolution, function_execution_time_ms),
                    TaskOutcome::Rejection {
                        content,
                        function_execution_time_ms,
                    } => (content, ResultTypeWire::Rejection, function_execution_time_ms),
                };

                tokio::spawn(async move {
                    let request = PersistJobResultRequest {
                        result,
                        result_type,
                        function_execution_time_ms: Some(function_execution_time_ms),
                    };
                    if let Err(err) = transport.persist_job_result(job_id, &request).await {
                        warn!(%job_id, error = %err, "result-sink post failed; self-healer will recover");
                    }
                });
            });
            drop(queue);

            if add_result.is_err() {
                self.current.fetch_sub(1, Ordering::SeqCst);
            }
        }

        Ok(false)
    }
}
