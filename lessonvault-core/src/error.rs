use thiserror::Error;

/// Error taxonomy shared across the credential, storage, authorization
/// and transcode layers. HTTP status mapping happens in `lessonvault-api`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// No credential was presented at all, distinct from a credential
    /// that was presented but failed verification or binding (spec
    /// §4.C: "a missing credential responds 403 with a distinct
    /// 'missing' message").
    #[error("credential missing: {0}")]
    MissingCredential(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transcode failed: {0}")]
    TranscodeFailed(String),

    #[error("callback delivery failed: {0}")]
    CallbackFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(err.to_string()),
            _ => Error::Internal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("serialization error: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
