//! Deployment: a packaged worker image bound to `(cluster, service)`. At most one
//! `active` per `(cluster, service)`; release demotes the current active to
//! `inactive` and promotes the newcomer (§3).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use typed_builder::TypedBuilder;

use crate::error::{EngineError, EngineResult};
use crate::ids::{ClusterId, DeploymentId};
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "deployment_status", rename_all = "lowercase")]
pub enum DeploymentStatus {
    #[default]
    Uploading,
    Ready,
    Active,
    Inactive,
}

#[derive(FromRow, Debug, Clone, serde::Serialize, serde::Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct Deployment {
    #[builder(default = DeploymentId::new())]
    pub id: DeploymentId,

    pub cluster_id: ClusterId,
    pub service: String,

    #[builder(default)]
    pub status: DeploymentStatus,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

impl Deployment {
    /// Promote this deployment to `active`, demoting whatever was active before it
    /// in the same transaction so the single-active-per-(cluster,service) invariant
    /// always holds.
    pub async fn release(id: DeploymentId, cluster_id: ClusterId, db: &sqlx::PgPool) -> EngineResult<Self> {
        let mut tx = db.begin().await?;

        sqlx::query(
            r#"
            UPDATE deployments SET status = 'inactive', updated_at = NOW()
            WHERE cluster_id = $1
              AND service = (SELECT service FROM deployments WHERE id = $2 AND cluster_id = $1)
              AND status = 'active'
            "#,
        )
        .bind(cluster_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let deployment = sqlx::query_as::<_, Self>(
            r#"
            UPDATE deployments SET status = 'active', updated_at = NOW()
            WHERE id = $1 AND cluster_id = $2
            RETURNING id, cluster_id, service, status, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(cluster_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(EngineError::NotFound)?;

        tx.commit().await?;
        Ok(deployment)
    }

    pub async fn find_active(cluster_id: ClusterId, service: &str, db: &sqlx::PgPool) -> EngineResult<Option<Self>> {
        let deployment = sqlx::query_as::<_, Self>(
            r#"
            SELECT id, cluster_id, service, status, created_at, updated_at
            FROM deployments
            WHERE cluster_id = $1 AND service = $2 AND status = 'active'
            "#,
        )
        .bind(cluster_id)
        .bind(service)
        .fetch_optional(db)
        .await?;

        Ok(deployment)
    }
}

#[async_trait]
impl Record for Deployment {
    const TABLE: &'static str = "deployments";
    type Id = DeploymentId;

    async fn find_by_id(id: DeploymentId, db: &sqlx::PgPool) -> EngineResult<Self> {
        let deployment = sqlx::query_as::<_, Self>(
            "SELECT id, cluster_id, service, status, created_at, updated_at FROM deployments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(EngineError::NotFound)?;

        Ok(deployment)
    }

    async fn insert(&self, db: &sqlx::PgPool) -> EngineResult<Self> {
        let deployment = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO deployments (id, cluster_id, service, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, cluster_id, service, status, created_at, updated_at
            "#,
        )
        .bind(self.id)
        .bind(self.cluster_id)
        .bind(&self.service)
        .bind(self.status)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(db)
        .await?;

        Ok(deployment)
    }

    async fn update(&self, db: &sqlx::PgPool) -> EngineResult<Self> {
        let deployment = sqlx::query_as::<_, Self>(
            r#"
            UPDATE deployments SET status = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING id, cluster_id, service, status, created_at, updated_at
            "#,
        )
        .bind(self.status)
        .bind(self.id)
        .fetch_one(db)
        .await?;

        Ok(deployment)
    }

    async fn delete(&self, db: &sqlx::PgPool) -> EngineResult<()> {
        sqlx::query("DELETE FROM deployments WHERE id = $1")
            .bind(self.id)
            .execute(db)
            .await?;

        Ok(())
    }
}
