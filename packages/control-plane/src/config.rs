use anyhow::{Context, Result};
use dotenvy::dotenv;
use je_engine::config::EngineConfig;
use std::env;

/// Control-plane configuration: the engine's own config plus the HTTP bind port.
#[derive(Debug, Clone)]
pub struct Config {
    pub engine: EngineConfig,
    pub port: u16,
    /// Comma-separated `CORS_ALLOWED_ORIGINS`; empty means "allow any origin"
    /// (the development default).
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        let allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            engine: EngineConfig::from_env()?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            allowed_origins,
        })
    }
}
