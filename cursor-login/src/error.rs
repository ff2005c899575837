use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error("could not determine the Cursor config directory")]
    NoConfigDir,

    #[error("auth poll timed out after {0} attempts")]
    PollTimedOut(u32),

    #[error("refresh failed: {0}")]
    RefreshFailed(String),

    #[error("malformed JWT: {0}")]
    MalformedJwt(&'static str),
}
