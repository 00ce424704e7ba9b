//! Machine: a worker process instance. Append/upsert-on-ping only; no deletion in
//! the hot path (§3 ownership notes).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::error::EngineResult;
use crate::ids::{ClusterId, DeploymentId, MachineId};

#[derive(FromRow, Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Machine {
    pub id: MachineId,
    pub cluster_id: ClusterId,
    pub ip: Option<String>,
    pub deployment_id: Option<DeploymentId>,
    pub last_ping_at: DateTime<Utc>,
}

impl Machine {
    /// Upsert the calling machine's ping/ip/deployment (§4.2 dispatcher side effect).
    pub async fn ping(
        id: MachineId,
        cluster_id: ClusterId,
        ip: Option<String>,
        deployment_id: Option<DeploymentId>,
        db: &sqlx::PgPool,
    ) -> EngineResult<Self> {
        let machine = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO machines (id, cluster_id, ip, deployment_id, last_ping_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (id, cluster_id) DO UPDATE SET
                ip = EXCLUDED.ip,
                deployment_id = EXCLUDED.deployment_id,
                last_ping_at = NOW()
            RETURNING id, cluster_id, ip, deployment_id, last_ping_at
            "#,
        )
        .bind(id)
        .bind(cluster_id)
        .bind(ip)
        .bind(deployment_id)
        .fetch_one(db)
        .await?;

        Ok(machine)
    }

    /// Count of machines that pinged for a `(cluster, service)` within `within`,
    /// used by the wake-up notifier to approximate "running machines" (§4.6). A
    /// machine is associated with a service transitively through its deployment.
    pub async fn count_recently_active_for_service(
        cluster_id: ClusterId,
        service: &str,
        within: chrono::Duration,
        db: &sqlx::PgPool,
    ) -> EngineResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM machines m
            JOIN deployments d ON d.id = m.deployment_id
            WHERE m.cluster_id = $1 AND d.service = $2 AND m.last_ping_at >= $3
            "#,
        )
        .bind(cluster_id)
        .bind(service)
        .bind(Utc::now() - within)
        .fetch_one(db)
        .await?;

        Ok(count)
    }
}
