use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("unknown or expired join credential")]
    Unauthorized,

    #[error("credential does not allow this: {0}")]
    Forbidden(String),

    #[error("source {0} already has a publisher")]
    SourceBusy(String),

    #[error("media channel closed")]
    ChannelClosed,
}

impl From<MediaError> for gridcast_core::Error {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Unauthorized => Self::Unauthorized(err.to_string()),
            MediaError::Forbidden(msg) => Self::Forbidden(msg),
            MediaError::SourceBusy(source) => {
                Self::SourceUnavailable(format!("source {source} already has a publisher"))
            }
            MediaError::ChannelClosed => Self::Media(err.to_string()),
        }
    }
}
