pub mod deployments;
pub mod health;
pub mod jobs;
pub mod metrics;
