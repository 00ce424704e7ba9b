//! Dispatcher (`nextJobs`, §4.2): atomic claim by a polling worker, plus the
//! side-effect machine ping and service-definition upsert.

use tracing::warn;

use crate::error::EngineResult;
use crate::events::Event;
use crate::ids::{ClusterId, DeploymentId, JobId, MachineId};
use crate::job::Job;
use crate::service_definition::FunctionDeclaration;

pub struct ClaimedJob {
    pub id: JobId,
    pub target_fn: String,
    pub target_args: Vec<u8>,
}

impl From<Job> for ClaimedJob {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            target_fn: job.target_fn,
            target_args: job.target_args,
        }
    }
}

pub struct Dispatcher;

impl Dispatcher {
    /// Claim up to `limit` jobs for `(cluster, service)`, registering the calling
    /// machine's ping/ip/deployment and (best-effort) its service definition.
    #[allow(clippy::too_many_arguments)]
    pub async fn next_jobs(
        cluster_id: ClusterId,
        service: &str,
        limit: i64,
        machine_id: MachineId,
        ip: Option<String>,
        deployment_id: Option<DeploymentId>,
        functions: Option<&[FunctionDeclaration]>,
        db: &sqlx::PgPool,
    ) -> EngineResult<Vec<ClaimedJob>> {
        if let Err(err) = crate::machine::Machine::ping(machine_id, cluster_id, ip, deployment_id, db).await {
            warn!(%machine_id, %cluster_id, error = %err, "failed to record machine ping");
        }

        if let Some(functions) = functions {
            if let Err(err) =
                crate::service_definition::ServiceDefinition::upsert(cluster_id, service, functions, db).await
            {
                warn!(%cluster_id, service, error = %err, "failed to upsert service definition");
            }
        }

        let jobs = Job::claim_jobs(cluster_id, service, limit, machine_id, db).await?;

        for job in &jobs {
            if let Err(err) = Event::job_received(cluster_id, job.id, machine_id, db).await {
                warn!(job_id = %job.id, error = %err, "failed to record jobReceived event");
            }
        }

        Ok(jobs.into_iter().map(ClaimedJob::from).collect())
    }
}
