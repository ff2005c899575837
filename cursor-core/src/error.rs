use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Error kinds a caller can match on without string-sniffing, one variant per
/// row of the error-kind table this crate is built against.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed frame or protocol violation: {0}")]
    ProtocolFraming(String),

    #[error(transparent)]
    TransportIo(#[from] reqwest::Error),

    #[error("unauthorized (401) on {0}")]
    Unauthorized(&'static str),

    #[error("auth refresh failed: {0}")]
    AuthRefreshFailed(String),

    #[error("server aborted the exec stream: {0}")]
    ServerAbort(String),

    #[error("heartbeat starvation: no progress for {0} beats / {1}ms")]
    HeartbeatStarvation(u32, u64),

    #[error("unrecognized exec type: {0}")]
    UnknownExecType(String),

    #[error("unrecognized tool_call_id: {0}")]
    UnknownToolCallId(String),

    #[error("deadline exceeded after {0}ms")]
    DeadlineExceeded(u64),

    #[error("exceeded retry limit, last status: {0}")]
    RetryLimit(StatusCode),

    #[error(transparent)]
    Schema(#[from] cursor_protocol::SchemaError),

    #[error(transparent)]
    Wire(#[from] cursor_wire::WireError),

    #[error(transparent)]
    Auth(#[from] cursor_login::AuthError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    TokioJoin(#[from] tokio::task::JoinError),
}
