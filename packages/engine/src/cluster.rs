//! Cluster: the tenant boundary. Holds the shared secret workers authenticate with
//! plus per-cluster policy flags.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use typed_builder::TypedBuilder;

use crate::error::{EngineError, EngineResult};
use crate::ids::ClusterId;
use crate::record::Record;

#[derive(FromRow, Debug, Clone, serde::Serialize, serde::Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct Cluster {
    #[builder(default = ClusterId::new())]
    pub id: ClusterId,

    pub name: String,
    pub shared_secret: String,

    #[builder(default = true)]
    pub predictive_retries: bool,
    #[builder(default = true)]
    pub auto_retry_on_stall: bool,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

impl Cluster {
    /// Constant-time-ish secret check (string equality; the secret is never logged).
    pub fn authenticate(&self, presented_secret: &str) -> EngineResult<()> {
        if self.shared_secret == presented_secret {
            Ok(())
        } else {
            Err(EngineError::Unauthorized)
        }
    }

    pub async fn find_by_secret(secret: &str, db: &sqlx::PgPool) -> EngineResult<Self> {
        let cluster = sqlx::query_as::<_, Self>(
            r#"
            SELECT id, name, shared_secret, predictive_retries, auto_retry_on_stall, created_at, updated_at
            FROM clusters
            WHERE shared_secret = $1
            "#,
        )
        .bind(secret)
        .fetch_optional(db)
        .await?
        .ok_or(EngineError::Unauthorized)?;

        Ok(cluster)
    }
}

#[async_trait]
impl Record for Cluster {
    const TABLE: &'static str = "clusters";
    type Id = ClusterId;

    async fn find_by_id(id: ClusterId, db: &sqlx::PgPool) -> EngineResult<Self> {
        let cluster = sqlx::query_as::<_, Self>(
            r#"
            SELECT id, name, shared_secret, predictive_retries, auto_retry_on_stall, created_at, updated_at
            FROM clusters
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(EngineError::NotFound)?;

        Ok(cluster)
    }

    async fn insert(&self, db: &sqlx::PgPool) -> EngineResult<Self> {
        let cluster = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO clusters (id, name, shared_secret, predictive_retries, auto_retry_on_stall, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, shared_secret, predictive_retries, auto_retry_on_stall, created_at, updated_at
            "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.shared_secret)
        .bind(self.predictive_retries)
        .bind(self.auto_retry_on_stall)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(db)
        .await?;

        Ok(cluster)
    }

    async fn update(&self, db: &sqlx::PgPool) -> EngineResult<Self> {
        let cluster = sqlx::query_as::<_, Self>(
            r#"
            UPDATE clusters SET
                name = $1, shared_secret = $2, predictive_retries = $3, auto_retry_on_stall = $4, updated_at = NOW()
            WHERE id = $5
            RETURNING id, name, shared_secret, predictive_retries, auto_retry_on_stall, created_at, updated_at
            "#,
        )
        .bind(&self.name)
        .bind(&self.shared_secret)
        .bind(self.predictive_retries)
        .bind(self.auto_retry_on_stall)
        .bind(self.id)
        .fetch_one(db)
        .await?;

        Ok(cluster)
    }

    async fn delete(&self, db: &sqlx::PgPool) -> EngineResult<()> {
        sqlx::query("DELETE FROM clusters WHERE id = $1")
            .bind(self.id)
            .execute(db)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cluster() -> Cluster {
        Cluster::builder().name("acme").shared_secret("s3cret").build()
    }

    #[test]
    fn matching_secret_authenticates() {
        assert!(sample_cluster().authenticate("s3cret").is_ok());
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let err = sample_cluster().authenticate("wrong").unwrap_err();
        assert!(matches!(err, EngineError::Unauthorized));
    }
}
