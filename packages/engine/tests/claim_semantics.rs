//! Integration tests against a real Postgres (§3, §4.1, §4.2, §4.3): admission
//! dedup, FIFO claim order, and idempotent result persistence.

mod common;

use je_engine::ids::MachineId;
use je_engine::record::Record;
use je_engine::{Admission, CallConfig, Cluster, Job, JobStatus, ResultSink, ResultType};

async fn sample_cluster(db: &sqlx::PgPool) -> Cluster {
    Cluster::builder()
        .name("test-cluster")
        .shared_secret(uuid::Uuid::new_v4().to_string())
        .build()
        .insert(db)
        .await
        .expect("insert cluster")
}

#[tokio::test]
async fn repeated_idempotency_key_collapses_to_one_job() {
    let db = common::pool().await;
    let cluster = sample_cluster(&db).await;

    let config = CallConfig::builder().idempotency_key("order-42").build();

    let first = Admission::create_job(
        cluster.id,
        "billing",
        "chargeCard",
        b"{}".to_vec(),
        None,
        config.clone(),
        &db,
    )
    .await
    .expect("first admission");

    let second = Admission::create_job(
        cluster.id,
        "billing",
        "chargeCard",
        b"{}".to_vec(),
        None,
        config,
        &db,
    )
    .await
    .expect("second admission");

    assert_eq!(first, second);
}

#[tokio::test]
async fn claim_jobs_returns_fifo_order() {
    let db = common::pool().await;
    let cluster = sample_cluster(&db).await;
    let machine_id = MachineId::new();

    let mut created = Vec::new();
    for i in 0..5 {
        let id = Admission::create_job(
            cluster.id,
            "greeter",
            "hello",
            format!("{{\"n\":{i}}}").into_bytes(),
            None,
            CallConfig::default(),
            &db,
        )
        .await
        .expect("admission");
        created.push(id);
    }

    let claimed = Job::claim_jobs(cluster.id, "greeter", 5, machine_id, &db)
        .await
        .expect("claim");

    let claimed_ids: Vec<_> = claimed.iter().map(|job| job.id).collect();
    assert_eq!(claimed_ids, created);
    assert!(claimed.iter().all(|job| job.status == JobStatus::Running));
}

#[tokio::test]
async fn claim_jobs_respects_limit_and_skips_locked_rows() {
    let db = common::pool().await;
    let cluster = sample_cluster(&db).await;
    let machine_id = MachineId::new();

    for _ in 0..3 {
        Admission::create_job(
            cluster.id,
            "greeter",
            "hello",
            b"{}".to_vec(),
            None,
            CallConfig::default(),
            &db,
        )
        .await
        .expect("admission");
    }

    let first_batch = Job::claim_jobs(cluster.id, "greeter", 2, machine_id, &db)
        .await
        .expect("first claim");
    assert_eq!(first_batch.len(), 2);

    let second_batch = Job::claim_jobs(cluster.id, "greeter", 2, machine_id, &db)
        .await
        .expect("second claim");
    assert_eq!(second_batch.len(), 1);
}

#[tokio::test]
async fn persist_result_is_idempotent_after_terminal_success() {
    let db = common::pool().await;
    let cluster = sample_cluster(&db).await;
    let machine_id = MachineId::new();

    let job_id = Admission::create_job(
        cluster.id,
        "greeter",
        "hello",
        b"{}".to_vec(),
        None,
        CallConfig::default(),
        &db,
    )
    .await
    .expect("admission");

    Job::claim_jobs(cluster.id, "greeter", 1, machine_id, &db)
        .await
        .expect("claim");

    let first = ResultSink::persist_job_result(job_id, cluster.id, b"ok", ResultType::Resolution, Some(12), &db)
        .await
        .expect("first persist");
    assert_eq!(first.status, JobStatus::Success);
    assert_eq!(first.result, Some(b"ok".to_vec()));

    let second = ResultSink::persist_job_result(job_id, cluster.id, b"ignored", ResultType::Rejection, Some(99), &db)
        .await
        .expect("second persist is a no-op");

    assert_eq!(second.result, Some(b"ok".to_vec()));
    assert_eq!(second.result_type, Some(ResultType::Resolution));
}
