//! Test doubles shared across the engine's own tests and downstream crates.
//!
//! Database-backed behavior (claim semantics, self-healing, long-poll) is exercised
//! against a real Postgres via `testcontainers` in integration tests; this module
//! only covers the pieces that make sense to fake in-process.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::deployment::Deployment;
use crate::wakeup::{ClusterActivity, DeploymentProvider};

/// A `DeploymentProvider` that records calls instead of talking to a real
/// serverless backend. Used by worker/control-plane tests that need a wake-up
/// notifier without a provider implementation of their own.
#[derive(Default)]
pub struct RecordingDeploymentProvider {
    pub notify_calls: AtomicUsize,
}

#[async_trait]
impl DeploymentProvider for RecordingDeploymentProvider {
    fn name(&self) -> &str {
        "test-provider"
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({})
    }

    fn minimum_notification_interval(&self) -> Duration {
        Duration::from_millis(0)
    }

    async fn create(&self, _deployment: &Deployment) -> anyhow::Result<()> {
        Ok(())
    }

    async fn update(&self, _deployment: &Deployment) -> anyhow::Result<()> {
        Ok(())
    }

    async fn notify(&self, _deployment: &Deployment, _activity: ClusterActivity) -> anyhow::Result<()> {
        self.notify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
