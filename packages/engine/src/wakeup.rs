//! Wake-up Notifier (§4.6): debounced trigger of a serverless deployment when
//! pending work exists and no worker machine is running for the service.
//!
//! The provider is an external collaborator (§6, §9): to avoid a circular
//! dependency between "what's the queue depth" and "who deploys", the notifier is
//! handed a read-only `ClusterActivity` snapshot instead of reaching back into the
//! job/machine tables itself.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::deployment::Deployment;
use crate::error::EngineResult;
use crate::ids::{ClusterId, DeploymentId};
use crate::job::Job;
use crate::machine::Machine;

/// A read-only snapshot of queue depth and worker liveness for one
/// `(cluster, service)`, computed by the caller and handed to the notifier. Keeps
/// `DeploymentProvider` implementations ignorant of the job/machine schema.
#[derive(Debug, Clone, Copy)]
pub struct ClusterActivity {
    pub pending_jobs: i64,
    pub running_machines: i64,
}

/// External collaborator: a serverless (or other on-demand) deployment backend.
/// Implementations live outside the core (§6); this crate only defines the seam.
#[async_trait]
pub trait DeploymentProvider: Send + Sync {
    fn name(&self) -> &str;
    fn schema(&self) -> serde_json::Value;
    fn minimum_notification_interval(&self) -> Duration;

    async fn create(&self, deployment: &Deployment) -> anyhow::Result<()>;
    async fn update(&self, deployment: &Deployment) -> anyhow::Result<()>;
    async fn notify(&self, deployment: &Deployment, activity: ClusterActivity) -> anyhow::Result<()>;
}

/// Debounces notifications per deployment so a provider is never invoked more
/// often than `minimum_notification_interval()`.
pub struct WakeupNotifier<P: DeploymentProvider> {
    provider: P,
    last_notified: Mutex<HashMap<DeploymentId, Instant>>,
}

impl<P: DeploymentProvider> WakeupNotifier<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            last_notified: Mutex::new(HashMap::new()),
        }
    }

    fn debounced(&self, deployment_id: DeploymentId) -> bool {
        let now = Instant::now();
        let mut last = self.last_notified.lock().expect("wakeup debounce lock poisoned");
        match last.get(&deployment_id) {
            Some(&at) if now.duration_since(at) < self.provider.minimum_notification_interval() => false,
            _ => {
                last.insert(deployment_id, now);
                true
            }
        }
    }

    /// Compute activity for `(cluster, service)` and, if there is pending work and
    /// no running machines for an active deployment, notify the provider.
    pub async fn check_and_notify(
        &self,
        cluster_id: ClusterId,
        service: &str,
        db: &sqlx::PgPool,
    ) -> EngineResult<()> {
        let Some(deployment) = Deployment::find_active(cluster_id, service, db).await? else {
            return Ok(());
        };

        let activity = ClusterActivity {
            pending_jobs: Job::count_pending(cluster_id, service, db).await?,
            running_machines: Machine::count_recently_active_for_service(
                cluster_id,
                service,
                chrono::Duration::seconds(30),
                db,
            )
            .await?,
        };

        if activity.pending_jobs > 0 && activity.running_machines == 0 && self.debounced(deployment.id) {
            if let Err(err) = self.provider.notify(&deployment, activity).await {
                tracing::warn!(deployment_id = %deployment.id, error = %err, "wake-up notify failed");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DeploymentProvider for CountingProvider {
        fn name(&self) -> &str {
            "test"
        }

        fn schema(&self) -> serde_json::Value {
            serde_json::json!({})
        }

        fn minimum_notification_interval(&self) -> Duration {
            Duration::from_secs(10)
        }

        async fn create(&self, _deployment: &Deployment) -> anyhow::Result<()> {
            Ok(())
        }

        async fn update(&self, _deployment: &Deployment) -> anyhow::Result<()> {
            Ok(())
        }

        async fn notify(&self, _deployment: &Deployment, _activity: ClusterActivity) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn debounce_suppresses_a_second_call_within_the_window() {
        let notifier = WakeupNotifier::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let deployment_id = DeploymentId::new();
        assert!(notifier.debounced(deployment_id));
        assert!(!notifier.debounced(deployment_id));
    }
}
