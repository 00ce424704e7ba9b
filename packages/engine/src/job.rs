//! Job model: the central entity of the job lifecycle engine.
//!
//! A job is one invocation of a `(service, target_fn, args)` tuple with a durable
//! lifecycle. Rows are deduplicated on `(cluster_id, target_fn, idempotency_key)`;
//! `id` is a separate sortable surrogate key (UUIDv7) used for FIFO claim order and
//! as the foreign key target from events and results. The `idempotency_key` unique
//! index is what §3 calls the admission dedup "primary key" in spec terms; we keep a
//! surrogate `id` column too since machines, events and HTTP responses all need a
//! stable handle that does not require carrying the whole tuple around.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use typed_builder::TypedBuilder;

use crate::error::{EngineError, EngineResult};
use crate::ids::{ClusterId, DeploymentId, JobId, MachineId};
use crate::record::Record;

/// Stall detection falls back to this when a job carries no `timeout_interval_seconds`.
pub const DEFAULT_TIMEOUT_SECONDS: i32 = 30;

/// Default attempts when the caller does not set `retry_count_on_stall`.
pub const DEFAULT_RETRY_COUNT_ON_STALL: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Success,
    /// Stalled-and-retryable-if-attempts-remain, NOT terminal failure.
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, sqlx::Type)]
#[sqlx(type_name = "result_type", rename_all = "lowercase")]
pub enum ResultType {
    Resolution,
    Rejection,
}

#[derive(FromRow, Debug, Clone, serde::Serialize, serde::Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct Job {
    #[builder(default = JobId::new())]
    pub id: JobId,

    pub cluster_id: ClusterId,
    pub service: String,
    pub target_fn: String,
    pub target_args: Vec<u8>,

    #[builder(default)]
    pub status: JobStatus,

    #[builder(default, setter(strip_option))]
    pub result: Option<Vec<u8>>,
    #[builder(default, setter(strip_option))]
    pub result_type: Option<ResultType>,

    pub idempotency_key: String,

    #[builder(default, setter(strip_option))]
    pub cache_key: Option<String>,

    #[builder(default = 1 + DEFAULT_RETRY_COUNT_ON_STALL)]
    pub remaining_attempts: i32,

    #[builder(default, setter(strip_option))]
    pub timeout_interval_seconds: Option<i32>,

    #[builder(default, setter(strip_option))]
    pub executing_machine_id: Option<MachineId>,

    #[builder(default, setter(strip_option))]
    pub deployment_id: Option<DeploymentId>,

    /// Carried but unused by the engine itself (§9 "predictive retries" design note);
    /// the retry decision policy is an external collaborator's concern.
    #[builder(default = false)]
    pub predictive_retries_on_rejection: bool,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
    #[builder(default, setter(strip_option))]
    pub last_retrieved_at: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub resulted_at: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub function_execution_time_ms: Option<i64>,
}

const SELECT_COLUMNS: &str = r#"
    id, cluster_id, service, target_fn, target_args, status, result, result_type,
    idempotency_key, cache_key, remaining_attempts, timeout_interval_seconds,
    executing_machine_id, deployment_id, predictive_retries_on_rejection,
    created_at, updated_at, last_retrieved_at, resulted_at, function_execution_time_ms
"#;

impl Job {
    /// A job is claimable iff pending/stalled with attempts remaining (§3 invariants).
    pub fn is_claimable(&self) -> bool {
        matches!(self.status, JobStatus::Pending | JobStatus::Failure) && self.remaining_attempts > 0
    }

    /// Whether a fresh resolution under `cache_key` can be reused (§3 invariants).
    pub fn is_fresh_cache_hit(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Success
            && self.result_type == Some(ResultType::Resolution)
            && self.resulted_at.map(|at| at >= now - ttl).unwrap_or(false)
    }

    pub async fn find_by_idempotency_key(
        cluster_id: ClusterId,
        target_fn: &str,
        idempotency_key: &str,
        db: &sqlx::PgPool,
    ) -> EngineResult<Option<Self>> {
        let job = sqlx::query_as::<_, Self>(&format!(
            "SELECT {SELECT_COLUMNS} FROM jobs WHERE cluster_id = $1 AND target_fn = $2 AND idempotency_key = $3"
        ))
        .bind(cluster_id)
        .bind(target_fn)
        .bind(idempotency_key)
        .fetch_optional(db)
        .await?;

        Ok(job)
    }

    /// Newest-fresh cache hit for `(cluster, service, target_fn, cache_key)`, per §4.1
    /// ordering: newest-first on `resulted_at`, ties broken by id descending.
    pub async fn find_cache_hit(
        cluster_id: ClusterId,
        service: &str,
        target_fn: &str,
        cache_key: &str,
        ttl: chrono::Duration,
        db: &sqlx::PgPool,
    ) -> EngineResult<Option<Self>> {
        let job = sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {SELECT_COLUMNS} FROM jobs
            WHERE cluster_id = $1 AND service = $2 AND target_fn = $3 AND cache_key = $4
              AND status = 'success' AND result_type = 'resolution'
              AND resulted_at >= $5
            ORDER BY resulted_at DESC, id DESC
            LIMIT 1
            "#
        ))
        .bind(cluster_id)
        .bind(service)
        .bind(target_fn)
        .bind(cache_key)
        .bind(Utc::now() - ttl)
        .fetch_optional(db)
        .await?;

        Ok(job)
    }

    /// Atomic claim: `FOR UPDATE SKIP LOCKED` selects up to `limit` claimable jobs in
    /// id (creation) order and transitions them to `running`, decrementing attempts.
    pub async fn claim_jobs(
        cluster_id: ClusterId,
        service: &str,
        limit: i64,
        machine_id: MachineId,
        db: &sqlx::PgPool,
    ) -> EngineResult<Vec<Self>> {
        let jobs = sqlx::query_as::<_, Self>(&format!(
            r#"
            WITH next_jobs AS (
                SELECT id FROM jobs
                WHERE cluster_id = $1 AND service = $2
                  AND status IN ('pending', 'failure') AND remaining_attempts > 0
                ORDER BY id ASC
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs SET
                status = 'running',
                remaining_attempts = remaining_attempts - 1,
                last_retrieved_at = NOW(),
                executing_machine_id = $4,
                updated_at = NOW()
            WHERE id IN (SELECT id FROM next_jobs)
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(cluster_id)
        .bind(service)
        .bind(limit)
        .bind(machine_id)
        .fetch_all(db)
        .await?;

        Ok(jobs)
    }

    /// Persist a result, transitioning `running -> success` regardless of resolution
    /// vs. rejection (§4.3). Idempotent: re-posting against an already-terminated job
    /// is a no-op and returns the existing row unchanged.
    pub async fn persist_result(
        job_id: JobId,
        cluster_id: ClusterId,
        result: &[u8],
        result_type: ResultType,
        function_execution_time_ms: Option<i64>,
        db: &sqlx::PgPool,
    ) -> EngineResult<Self> {
        let existing = Self::find_by_id(job_id, db).await?;
        if existing.cluster_id != cluster_id {
            return Err(EngineError::Unauthorized);
        }
        if existing.status == JobStatus::Success {
            return Ok(existing);
        }

        let job = sqlx::query_as::<_, Self>(&format!(
            r#"
            UPDATE jobs SET
                status = 'success',
                result = $1,
                result_type = $2,
                function_execution_time_ms = $3,
                resulted_at = NOW(),
                updated_at = NOW()
            WHERE id = $4 AND cluster_id = $5
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(result)
        .bind(result_type)
        .bind(function_execution_time_ms)
        .bind(job_id)
        .bind(cluster_id)
        .fetch_one(db)
        .await?;

        Ok(job)
    }

    /// Self-healer: re-queue a timed-out running job, or finalize it as a terminal
    /// rejection if no attempts remain (§4.5). Returns `true` if a transition happened.
    pub async fn heal_stalled(&self, db: &sqlx::PgPool) -> EngineResult<bool> {
        if self.remaining_attempts > 0 {
            let rows = sqlx::query(
                r#"
                UPDATE jobs SET
                    status = 'pending',
                    executing_machine_id = NULL,
                    updated_at = NOW()
                WHERE id = $1 AND status = 'running'
                "#,
            )
            .bind(self.id)
            .execute(db)
            .await?
            .rows_affected();
            Ok(rows > 0)
        } else {
            let payload = b"stalled \xe2\x80\x94 no attempts remaining".to_vec();
            let rows = sqlx::query(
                r#"
                UPDATE jobs SET
                    status = 'success',
                    result = $2,
                    result_type = 'rejection',
                    resulted_at = NOW(),
                    updated_at = NOW()
                WHERE id = $1 AND status = 'running'
                "#,
            )
            .bind(self.id)
            .bind(&payload)
            .execute(db)
            .await?
            .rows_affected();
            Ok(rows > 0)
        }
    }

    /// Running jobs past their stall threshold, for the self-healer scan (§4.5).
    pub async fn find_stalled(default_timeout_seconds: i32, db: &sqlx::PgPool) -> EngineResult<Vec<Self>> {
        let jobs = sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {SELECT_COLUMNS} FROM jobs
            WHERE status = 'running'
              AND NOW() - last_retrieved_at > (COALESCE(timeout_interval_seconds, $1) || ' seconds')::INTERVAL
            "#
        ))
        .bind(default_timeout_seconds)
        .fetch_all(db)
        .await?;

        Ok(jobs)
    }

    /// Count of claimable jobs per `(cluster, service)`, for the wake-up notifier (§4.6).
    pub async fn count_pending(cluster_id: ClusterId, service: &str, db: &sqlx::PgPool) -> EngineResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM jobs
            WHERE cluster_id = $1 AND service = $2
              AND status IN ('pending', 'failure') AND remaining_attempts > 0
            "#,
        )
        .bind(cluster_id)
        .bind(service)
        .fetch_one(db)
        .await?;

        Ok(count)
    }
}

#[async_trait]
impl Record for Job {
    const TABLE: &'static str = "jobs";
    type Id = JobId;

    async fn find_by_id(id: JobId, db: &sqlx::PgPool) -> EngineResult<Self> {
        let job = sqlx::query_as::<_, Self>(&format!("SELECT {SELECT_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await?
            .ok_or(EngineError::NotFound)?;

        Ok(job)
    }

    async fn insert(&self, db: &sqlx::PgPool) -> EngineResult<Self> {
        let job = sqlx::query_as::<_, Self>(&format!(
            r#"
            INSERT INTO jobs (
                id, cluster_id, service, target_fn, target_args, status, result, result_type,
                idempotency_key, cache_key, remaining_attempts, timeout_interval_seconds,
                executing_machine_id, deployment_id, predictive_retries_on_rejection,
                created_at, updated_at, last_retrieved_at, resulted_at, function_execution_time_ms
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8,
                $9, $10, $11, $12,
                $13, $14, $15,
                $16, $17, $18, $19, $20
            )
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(self.id)
        .bind(self.cluster_id)
        .bind(&self.service)
        .bind(&self.target_fn)
        .bind(&self.target_args)
        .bind(self.status)
        .bind(&self.result)
        .bind(self.result_type)
        .bind(&self.idempotency_key)
        .bind(&self.cache_key)
        .bind(self.remaining_attempts)
        .bind(self.timeout_interval_seconds)
        .bind(self.executing_machine_id)
        .bind(self.deployment_id)
        .bind(self.predictive_retries_on_rejection)
        .bind(self.created_at)
        .bind(self.updated_at)
        .bind(self.last_retrieved_at)
        .bind(self.resulted_at)
        .bind(self.function_execution_time_ms)
        .fetch_one(db)
        .await?;

        Ok(job)
    }

    async fn update(&self, db: &sqlx::PgPool) -> EngineResult<Self> {
        let job = sqlx::query_as::<_, Self>(&format!(
            r#"
            UPDATE jobs SET
                status = $1, result = $2, result_type = $3, remaining_attempts = $4,
                executing_machine_id = $5, deployment_id = $6, last_retrieved_at = $7,
                resulted_at = $8, function_execution_time_ms = $9, updated_at = NOW()
            WHERE id = $10
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(self.status)
        .bind(&self.result)
        .bind(self.result_type)
        .bind(self.remaining_attempts)
        .bind(self.executing_machine_id)
        .bind(self.deployment_id)
        .bind(self.last_retrieved_at)
        .bind(self.resulted_at)
        .bind(self.function_execution_time_ms)
        .bind(self.id)
        .fetch_one(db)
        .await?;

        Ok(job)
    }

    async fn delete(&self, db: &sqlx::PgPool) -> EngineResult<()> {
        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(self.id)
            .execute(db)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> Job {
        Job::builder()
            .cluster_id(ClusterId::new())
            .service("greeter")
            .target_fn("hello")
            .target_args(b"world".to_vec())
            .idempotency_key("k1")
            .build()
    }

    #[test]
    fn new_job_starts_pending_with_default_attempts() {
        let job = sample_job();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.remaining_attempts, 1 + DEFAULT_RETRY_COUNT_ON_STALL);
    }

    #[test]
    fn pending_job_with_attempts_is_claimable() {
        assert!(sample_job().is_claimable());
    }

    #[test]
    fn job_with_no_attempts_left_is_not_claimable() {
        let mut job = sample_job();
        job.remaining_attempts = 0;
        assert!(!job.is_claimable());
    }

    #[test]
    fn running_job_is_not_claimable() {
        let mut job = sample_job();
        job.status = JobStatus::Running;
        assert!(!job.is_claimable());
    }

    #[test]
    fn stalled_job_with_attempts_is_claimable() {
        let mut job = sample_job();
        job.status = JobStatus::Failure;
        assert!(job.is_claimable());
    }

    #[test]
    fn fresh_resolution_within_ttl_is_a_cache_hit() {
        let mut job = sample_job();
        job.status = JobStatus::Success;
        job.result_type = Some(ResultType::Resolution);
        job.resulted_at = Some(Utc::now());
        assert!(job.is_fresh_cache_hit(chrono::Duration::seconds(60), Utc::now()));
    }

    #[test]
    fn stale_resolution_past_ttl_is_not_a_cache_hit() {
        let mut job = sample_job();
        job.status = JobStatus::Success;
        job.result_type = Some(ResultType::Resolution);
        job.resulted_at = Some(Utc::now() - chrono::Duration::seconds(120));
        assert!(!job.is_fresh_cache_hit(chrono::Duration::seconds(60), Utc::now()));
    }

    #[test]
    fn rejection_never_counts_as_cache_hit() {
        let mut job = sample_job();
        job.status = JobStatus::Success;
        job.result_type = Some(ResultType::Rejection);
        job.resulted_at = Some(Utc::now());
        assert!(!job.is_fresh_cache_hit(chrono::Duration::seconds(60), Utc::now()));
    }
}
