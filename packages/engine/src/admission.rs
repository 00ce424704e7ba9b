//! Admission (`createJob`, §4.1): deduplication on idempotency key, optional
//! cache-keyed reuse of a prior successful resolution.

use typed_builder::TypedBuilder;

use crate::error::EngineResult;
use crate::events::Event;
use crate::ids::{ClusterId, DeploymentId, JobId};
use crate::job::{Job, DEFAULT_RETRY_COUNT_ON_STALL};
use crate::record::Record;

/// The recognized `call_config` options (§4.1 table).
#[derive(Debug, Clone, Default, TypedBuilder)]
#[builder(field_defaults(default, setter(strip_option, into)))]
pub struct CallConfig {
    pub idempotency_key: Option<String>,
    pub cache_key: Option<String>,
    pub cache_ttl_seconds: Option<i64>,
    pub retry_count_on_stall: Option<i32>,
    pub timeout_seconds: Option<i32>,
    pub predictive_retries_on_rejection: Option<bool>,
    pub execution_id: Option<JobId>,
}

pub struct Admission;

impl Admission {
    /// Admit a job for `(cluster, service, target_fn, target_args)` under `config`.
    /// Returns the id of the job the caller should poll, which may be a pre-existing
    /// row (idempotency collapse or cache hit).
    pub async fn create_job(
        cluster_id: ClusterId,
        service: &str,
        target_fn: &str,
        target_args: Vec<u8>,
        deployment_id: Option<DeploymentId>,
        config: CallConfig,
        db: &sqlx::PgPool,
    ) -> EngineResult<JobId> {
        let job_id = config.execution_id.unwrap_or_else(JobId::new);
        let idempotency_key = config
            .idempotency_key
            .clone()
            .unwrap_or_else(|| job_id.to_string());

        if let Some(existing) =
            Job::find_by_idempotency_key(cluster_id, target_fn, &idempotency_key, db).await?
        {
            return Ok(existing.id);
        }

        if let (Some(cache_key), Some(ttl_seconds)) = (&config.cache_key, config.cache_ttl_seconds) {
            if let Some(hit) = Job::find_cache_hit(
                cluster_id,
                service,
                target_fn,
                cache_key,
                chrono::Duration::seconds(ttl_seconds),
                db,
            )
            .await?
            {
                return Ok(hit.id);
            }
        }

        let remaining_attempts = 1 + config.retry_count_on_stall.unwrap_or(DEFAULT_RETRY_COUNT_ON_STALL);

        let mut builder = Job::builder()
            .id(job_id)
            .cluster_id(cluster_id)
            .service(service)
            .target_fn(target_fn)
            .target_args(target_args)
            .idempotency_key(idempotency_key)
            .remaining_attempts(remaining_attempts)
            .predictive_retries_on_rejection(config.predictive_retries_on_rejection.unwrap_or(false));

        if let Some(cache_key) = config.cache_key {
            builder = builder.cache_key(cache_key);
        }
        if let Some(timeout_seconds) = config.timeout_seconds {
            builder = builder.timeout_interval_seconds(timeout_seconds);
        }
        if let Some(deployment_id) = deployment_id {
            builder = builder.deployment_id(deployment_id);
        }

        let job = builder.build().insert(db).await?;
        Event::job_created(cluster_id, job.id, db).await?;

        Ok(job.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_defaults_to_job_id_string() {
        let job_id = JobId::new();
        let config = CallConfig::builder().execution_id(job_id).build();
        let key = config.idempotency_key.clone().unwrap_or_else(|| job_id.to_string());
        assert_eq!(key, job_id.to_string());
    }

    #[test]
    fn retry_count_defaults_to_two_giving_three_attempts() {
        let config = CallConfig::default();
        let attempts = 1 + config.retry_count_on_stall.unwrap_or(DEFAULT_RETRY_COUNT_ON_STALL);
        assert_eq!(attempts, 3);
    }
}
