//! Result Sink (`persistJobResult`, §4.3): the only place a job transitions into
//! `success`, whether the outcome was a resolution or a rejection.

use crate::error::EngineResult;
use crate::ids::{ClusterId, JobId};
use crate::job::{Job, ResultType};

pub struct ResultSink;

impl ResultSink {
    /// Idempotent: re-posting against an already-terminated job is a no-op and
    /// returns the row unchanged (last-writer-wins only applies to the first post
    /// that actually transitions the job).
    pub async fn persist_job_result(
        job_id: JobId,
        cluster_id: ClusterId,
        result: &[u8],
        result_type: ResultType,
        function_execution_time_ms: Option<i64>,
        db: &sqlx::PgPool,
    ) -> EngineResult<Job> {
        Job::persist_result(job_id, cluster_id, result, result_type, function_execution_time_ms, db).await
    }
}
