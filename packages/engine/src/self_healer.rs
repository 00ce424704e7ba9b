//! Self-Healer (§4.5): periodic scan that re-queues timed-out running jobs and
//! finalizes exhausted ones. Idempotent — re-running in the same window produces
//! the same outcome, since `heal_stalled` only acts on rows still `running`.

use std::time::Duration;

use tracing::{info, warn};

use crate::error::EngineResult;
use crate::events::Event;
use crate::job::{Job, DEFAULT_TIMEOUT_SECONDS};

pub const SELF_HEAL_INTERVAL: Duration = Duration::from_secs(5);

pub struct SelfHealer;

impl SelfHealer {
    /// Run one scan-and-heal pass, returning the number of jobs transitioned.
    pub async fn run_once(db: &sqlx::PgPool) -> EngineResult<usize> {
        let stalled = Job::find_stalled(DEFAULT_TIMEOUT_SECONDS, db).await?;
        let mut healed = 0;

        for job in &stalled {
            let retrying = job.remaining_attempts > 0;
            match job.heal_stalled(db).await {
                Ok(true) => {
                    healed += 1;
                    let event_result = if retrying {
                        Event::job_stalled(job.cluster_id, job.id, db).await
                    } else {
                        Event::job_stalled_terminal(job.cluster_id, job.id, db).await
                    };
                    if let Err(err) = event_result {
                        warn!(job_id = %job.id, error = %err, "failed to record self-heal event");
                    }
                }
                Ok(false) => {
                    // Already moved on by a concurrent healer pass or a late result post.
                }
                Err(err) => warn!(job_id = %job.id, error = %err, "failed to heal stalled job"),
            }
        }

        if healed > 0 {
            info!(healed, scanned = stalled.len(), "self-healer pass complete");
        }

        Ok(healed)
    }

    /// Spawn the periodic scan loop on the current tokio runtime.
    pub fn spawn(db: sqlx::PgPool) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SELF_HEAL_INTERVAL);
            loop {
                ticker.tick().await;
                if let Err(err) = Self::run_once(&db).await {
                    warn!(error = %err, "self-healer pass failed");
                }
            }
        })
    }
}
