use thiserror::Error;

/// Errors surfaced by the job lifecycle engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("cluster secret missing or invalid")]
    Unauthorized,

    #[error("job belongs to a different cluster")]
    Forbidden,

    #[error("job not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
