//! Shared Postgres container for the engine's integration tests. Started once per
//! test binary run and reused; each test gets its own connection pool against the
//! same database (grounded on the control plane's migration set, since the engine
//! crate itself carries no migrations of its own).

use sqlx::PgPool;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use tokio::sync::OnceCell;

struct SharedPostgres {
    db_url: String,
    _container: ContainerAsync<GenericImage>,
}

static SHARED: OnceCell<SharedPostgres> = OnceCell::const_new();

async fn shared() -> &'static SharedPostgres {
    SHARED
        .get_or_init(|| async {
            let container = GenericImage::new("postgres", "16-alpine")
                .with_wait_for(WaitFor::message_on_stderr("database system is ready to accept connections"))
                .with_exposed_port(ContainerPort::Tcp(5432))
                .with_env_var("POSTGRES_PASSWORD", "postgres")
                .with_env_var("POSTGRES_USER", "postgres")
                .with_env_var("POSTGRES_DB", "postgres")
                .start()
                .await
                .expect("failed to start postgres container");

            let host = container.get_host().await.expect("container host");
            let port = container
                .get_host_port_ipv4(5432)
                .await
                .expect("container port");
            let db_url = format!("postgresql://postgres:postgres@{host}:{port}/postgres");

            let pool = PgPool::connect(&db_url).await.expect("connect for migrations");
            sqlx::migrate!("../control-plane/migrations")
                .run(&pool)
                .await
                .expect("run migrations");
            pool.close().await;

            SharedPostgres {
                db_url,
                _container: container,
            }
        })
        .await
}

/// A fresh pool against the shared, already-migrated test database.
pub async fn pool() -> PgPool {
    let infra = shared().await;
    PgPool::connect(&infra.db_url).await.expect("connect test pool")
}
