//! Append-only audit stream. Write-only from the core's perspective: components
//! record facts here but nothing downstream of admission/dispatch/result/self-heal
//! reads them back to make decisions.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::error::EngineResult;
use crate::ids::{ClusterId, DeploymentId, EventId, JobId, MachineId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_tag", rename_all = "camelCase")]
pub enum EventTag {
    JobCreated,
    JobReceived,
    JobStatusRequest,
    JobStalled,
    JobStalledTerminal,
}

#[derive(FromRow, Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Event {
    pub id: EventId,
    pub cluster_id: ClusterId,
    pub tag: EventTag,
    pub job_id: Option<JobId>,
    pub machine_id: Option<MachineId>,
    pub deployment_id: Option<DeploymentId>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub async fn record(
        cluster_id: ClusterId,
        tag: EventTag,
        job_id: Option<JobId>,
        machine_id: Option<MachineId>,
        deployment_id: Option<DeploymentId>,
        db: &sqlx::PgPool,
    ) -> EngineResult<Self> {
        let event = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO events (id, cluster_id, tag, job_id, machine_id, deployment_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING id, cluster_id, tag, job_id, machine_id, deployment_id, created_at
            "#,
        )
        .bind(EventId::new())
        .bind(cluster_id)
        .bind(tag)
        .bind(job_id)
        .bind(machine_id)
        .bind(deployment_id)
        .fetch_one(db)
        .await?;

        Ok(event)
    }

    pub async fn job_created(cluster_id: ClusterId, job_id: JobId, db: &sqlx::PgPool) -> EngineResult<Self> {
        Self::record(cluster_id, EventTag::JobCreated, Some(job_id), None, None, db).await
    }

    pub async fn job_received(
        cluster_id: ClusterId,
        job_id: JobId,
        machine_id: MachineId,
        db: &sqlx::PgPool,
    ) -> EngineResult<Self> {
        Self::record(cluster_id, EventTag::JobReceived, Some(job_id), Some(machine_id), None, db).await
    }

    pub async fn job_status_request(cluster_id: ClusterId, job_id: JobId, db: &sqlx::PgPool) -> EngineResult<Self> {
        Self::record(cluster_id, EventTag::JobStatusRequest, Some(job_id), None, None, db).await
    }

    pub async fn job_stalled(cluster_id: ClusterId, job_id: JobId, db: &sqlx::PgPool) -> EngineResult<Self> {
        Self::record(cluster_id, EventTag::JobStalled, Some(job_id), None, None, db).await
    }

    pub async fn job_stalled_terminal(cluster_id: ClusterId, job_id: JobId, db: &sqlx::PgPool) -> EngineResult<Self> {
        Self::record(cluster_id, EventTag::JobStalledTerminal, Some(job_id), None, None, db).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_tag_serializes_as_camel_case() {
        let json = serde_json::to_string(&EventTag::JobStalledTerminal).unwrap();
        assert_eq!(json, "\"jobStalledTerminal\"");
    }

    #[test]
    fn event_tag_roundtrips() {
        for tag in [
            EventTag::JobCreated,
            EventTag::JobReceived,
            EventTag::JobStatusRequest,
            EventTag::JobStalled,
            EventTag::JobStalledTerminal,
        ] {
            let json = serde_json::to_string(&tag).unwrap();
            let back: EventTag = serde_json::from_str(&json).unwrap();
            assert_eq!(tag, back);
        }
    }
}
