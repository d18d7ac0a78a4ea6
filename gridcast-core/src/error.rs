use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Authentication error: {0}")]
    Unauthorized(String),

    #[error("Authorization error: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Render failure: {0}")]
    TransientRender(String),

    #[error("Media transport error: {0}")]
    Media(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
