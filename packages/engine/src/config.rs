use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub default_timeout_seconds: i32,
}

impl EngineConfig {
    /// Load configuration from environment variables, loading a `.env` file first
    /// if present (development).
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a valid number")?,
            default_timeout_seconds: env::var("JOB_DEFAULT_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| crate::job::DEFAULT_TIMEOUT_SECONDS.to_string())
                .parse()
                .context("JOB_DEFAULT_TIMEOUT_SECONDS must be a valid number")?,
        })
    }

    pub async fn connect(&self) -> Result<sqlx::PgPool> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(self.database_max_connections)
            .connect(&self.database_url)
            .await
            .context("failed to connect to database")?;

        Ok(pool)
    }
}
