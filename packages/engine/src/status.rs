//! Status / Long-poll (`getJobStatus`, `getJobStatuses`, §4.4). The server never
//! blocks on the single-job read; the batch read polls in-process up to a bounded
//! timeout and returns whatever subset of ids resolved.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::{EngineError, EngineResult};
use crate::events::Event;
use crate::ids::{ClusterId, JobId};
use crate::job::{JobStatus, ResultType};

pub const MIN_LONG_POLL_MS: u64 = 5_000;
pub const MAX_LONG_POLL_MS: u64 = 20_000;
pub const DEFAULT_LONG_POLL_MS: u64 = 20_000;
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct JobStatusView {
    pub id: JobId,
    pub status: JobStatus,
    pub result: Option<Vec<u8>>,
    pub result_type: Option<ResultType>,
}

fn is_settled(status: JobStatus) -> bool {
    matches!(status, JobStatus::Success)
}

/// Clip an untrusted caller-supplied timeout to the `[5s, 20s]` window (§8 boundary
/// behavior).
pub fn clip_long_poll_timeout(requested_ms: u64) -> u64 {
    requested_ms.clamp(MIN_LONG_POLL_MS, MAX_LONG_POLL_MS)
}

async fn fetch_statuses(
    cluster_id: ClusterId,
    job_ids: &[JobId],
    db: &sqlx::PgPool,
) -> EngineResult<Vec<JobStatusView>> {
    let rows = sqlx::query_as::<_, (JobId, JobStatus, Option<Vec<u8>>, Option<ResultType>)>(
        r#"
        SELECT id, status, result, result_type FROM jobs
        WHERE cluster_id = $1 AND id = ANY($2)
        "#,
    )
    .bind(cluster_id)
    .bind(job_ids)
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, status, result, result_type)| JobStatusView {
            id,
            status,
            result,
            result_type,
        })
        .collect())
}

pub struct Status;

impl Status {
    /// Single-job read; does not block. `NotFound` if absent from the caller's
    /// cluster.
    pub async fn get_job_status(
        cluster_id: ClusterId,
        job_id: JobId,
        db: &sqlx::PgPool,
    ) -> EngineResult<JobStatusView> {
        let rows = fetch_statuses(cluster_id, &[job_id], db).await?;
        let view = rows.into_iter().next().ok_or(EngineError::NotFound)?;
        Event::job_status_request(cluster_id, job_id, db).await?;
        Ok(view)
    }

    /// Batched long-poll: read all requested rows; return immediately once any has
    /// settled, otherwise sleep 500ms and retry until `long_poll_timeout_ms` elapses.
    /// Missing ids are silently omitted; never errors on a partial miss.
    pub async fn get_job_statuses(
        cluster_id: ClusterId,
        job_ids: &[JobId],
        long_poll_timeout_ms: u64,
        db: &sqlx::PgPool,
    ) -> EngineResult<Vec<JobStatusView>> {
        let timeout = Duration::from_millis(clip_long_poll_timeout(long_poll_timeout_ms));
        let deadline = Instant::now() + timeout;

        loop {
            let rows = fetch_statuses(cluster_id, job_ids, db).await?;
            let any_settled = rows.iter().any(|r| is_settled(r.status));

            for row in &rows {
                Event::job_status_request(cluster_id, row.id, db).await?;
            }

            if any_settled || Instant::now() >= deadline {
                return Ok(rows);
            }

            tokio::time::sleep(POLL_INTERVAL.min(deadline - Instant::now())).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_below_minimum_is_clipped_up() {
        assert_eq!(clip_long_poll_timeout(1_000), MIN_LONG_POLL_MS);
    }

    #[test]
    fn timeout_above_maximum_is_clipped_down() {
        assert_eq!(clip_long_poll_timeout(60_000), MAX_LONG_POLL_MS);
    }

    #[test]
    fn timeout_within_range_is_unchanged() {
        assert_eq!(clip_long_poll_timeout(10_000), 10_000);
    }

    #[test]
    fn only_success_counts_as_settled() {
        assert!(is_settled(JobStatus::Success));
        assert!(!is_settled(JobStatus::Pending));
        assert!(!is_settled(JobStatus::Running));
        assert!(!is_settled(JobStatus::Failure));
    }
}
