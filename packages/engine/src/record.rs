//! Record trait for CRUD operations.
//!
//! Simple trait for database models that need standard operations.

use async_trait::async_trait;

use crate::error::EngineResult;

/// Trait for database records with CRUD operations.
#[async_trait]
pub trait Record: Sized + Send + Sync {
    /// The table name for this record type.
    const TABLE: &'static str;

    /// The ID type for this record.
    type Id;

    /// Find a record by its ID.
    async fn find_by_id(id: Self::Id, db: &sqlx::PgPool) -> EngineResult<Self>;

    /// Insert a new record.
    async fn insert(&self, db: &sqlx::PgPool) -> EngineResult<Self>;

    /// Update an existing record.
    async fn update(&self, db: &sqlx::PgPool) -> EngineResult<Self>;

    /// Delete a record.
    async fn delete(&self, db: &sqlx::PgPool) -> EngineResult<()>;
}
