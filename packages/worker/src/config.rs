use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use uuid::Uuid;

/// Serverless hosts set `DIFFERENTIAL_DEPLOYMENT_PROVIDER` to their provider name;
/// when it matches, the agent enables idle shutdown (§6, §4.8 step 7).
pub const SERVERLESS_MAX_IDLE_CYCLES: u32 = 2;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub control_plane_url: String,
    pub cluster_secret: String,
    pub service: String,
    pub machine_id: Uuid,
    pub deployment_id: Option<Uuid>,
    pub deployment_provider: Option<String>,
    pub serverless_provider_name: Option<String>,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        Ok(Self {
            control_plane_url: env::var("DIFFERENTIAL_CONTROL_PLANE_URL")
                .context("DIFFERENTIAL_CONTROL_PLANE_URL must be set")?,
            cluster_secret: env::var("DIFFERENTIAL_API_SECRET")
                .context("DIFFERENTIAL_API_SECRET must be set")?,
            service: env::var("DIFFERENTIAL_SERVICE").context("DIFFERENTIAL_SERVICE must be set")?,
            machine_id: Uuid::new_v4(),
            deployment_id: env::var("DIFFERENTIAL_DEPLOYMENT_ID")
                .ok()
                .and_then(|s| Uuid::parse_str(&s).ok()),
            deployment_provider: env::var("DIFFERENTIAL_DEPLOYMENT_PROVIDER").ok(),
            serverless_provider_name: env::var("DIFFERENTIAL_SERVERLESS_PROVIDER_NAME").ok(),
        })
    }

    /// Whether this process should run in idle-shutdown (serverless) mode.
    pub fn is_serverless(&self) -> bool {
        match (&self.deployment_provider, &self.serverless_provider_name) {
            (Some(provider), Some(serverless_name)) => provider == serverless_name,
            _ => false,
        }
    }

    pub fn max_idle_cycles(&self) -> Option<u32> {
        self.is_serverless().then_some(SERVERLESS_MAX_IDLE_CYCLES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> WorkerConfig {
        WorkerConfig {
            control_plane_url: "http://localhost:8080".into(),
            cluster_secret: "s".into(),
            service: "svc".into(),
            machine_id: Uuid::new_v4(),
            deployment_id: None,
            deployment_provider: None,
            serverless_provider_name: None,
        }
    }

    #[test]
    fn not_serverless_without_matching_provider() {
        let config = base_config();
        assert!(!config.is_serverless());
        assert_eq!(config.max_idle_cycles(), None);
    }

    #[test]
    fn serverless_when_provider_matches() {
        let mut config = base_config();
        config.deployment_provider = Some("lambda".into());
        config.serverless_provider_name = Some("lambda".into());
        assert!(config.is_serverless());
        assert_eq!(config.max_idle_cycles(), Some(SERVERLESS_MAX_IDLE_CYCLES));
    }

    #[test]
    fn not_serverless_when_provider_differs() {
        let mut config = base_config();
        config.deployment_provider = Some("lambda".into());
        config.serverless_provider_name = Some("cloud-run".into());
        assert!(!config.is_serverless());
    }
}
