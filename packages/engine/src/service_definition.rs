//! ServiceDefinition: per-cluster, per-service set of function declarations.
//! Upserted on each successful worker poll (§4.2); read by admission-time
//! validation and by wake-up configuration (§4.6).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::error::EngineResult;
use crate::ids::ClusterId;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    #[serde(default)]
    pub idempotent: bool,
    pub rate: Option<f64>,
    pub cache_ttl_seconds: Option<i64>,
    pub retry_config: Option<RetryConfig>,
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct RetryConfig {
    pub retry_count_on_stall: i32,
}

#[derive(FromRow, Debug, Clone)]
pub struct ServiceDefinition {
    pub cluster_id: ClusterId,
    pub service: String,
    /// `Vec<FunctionDeclaration>` packed as JSON; sqlx maps this column via `Json<T>`
    /// at the call site rather than a derived `FromRow` column, since the type
    /// carries no `Type<Postgres>` impl of its own.
    pub functions: sqlx::types::Json<Vec<FunctionDeclaration>>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceDefinition {
    /// Background upsert; per §4.2 errors here are logged, not surfaced to the caller.
    pub async fn upsert(
        cluster_id: ClusterId,
        service: &str,
        functions: &[FunctionDeclaration],
        db: &sqlx::PgPool,
    ) -> EngineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO service_definitions (cluster_id, service, functions, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (cluster_id, service) DO UPDATE SET
                functions = EXCLUDED.functions,
                updated_at = NOW()
            "#,
        )
        .bind(cluster_id)
        .bind(service)
        .bind(sqlx::types::Json(functions))
        .execute(db)
        .await?;

        Ok(())
    }

    pub async fn find(cluster_id: ClusterId, service: &str, db: &sqlx::PgPool) -> EngineResult<Option<Self>> {
        let def = sqlx::query_as::<_, Self>(
            "SELECT cluster_id, service, functions, updated_at FROM service_definitions WHERE cluster_id = $1 AND service = $2",
        )
        .bind(cluster_id)
        .bind(service)
        .fetch_optional(db)
        .await?;

        Ok(def)
    }
}
