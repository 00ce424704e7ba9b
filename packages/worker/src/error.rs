use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("function name already registered: {0}")]
    NameAlreadyRegistered(String),

    #[error("unauthorized, aborting polling agent")]
    Unauthorized,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("too many consecutive errors, aborting polling agent")]
    TooManyErrors,
}
