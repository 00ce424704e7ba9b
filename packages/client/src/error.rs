use thiserror::Error;

/// User-visible failure modes of the client-side `call` (§7).
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("job did not settle before the timeout")]
    JobTimeout,

    #[error("unauthorized")]
    Unauthorized,

    #[error("rejection: {0}")]
    Rejection(String),

    #[error("too many network errors")]
    TooManyNetworkErrors,

    #[error("unexpected error: {0}")]
    UnexpectedError(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.status().map(|s| s.as_u16()) == Some(401) {
            ClientError::Unauthorized
        } else {
            ClientError::UnexpectedError(err.to_string())
        }
    }
}
