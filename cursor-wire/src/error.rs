use thiserror::Error;

pub type Result<T> = std::result::Result<T, WireError>;

/// Failures raised while decoding the schema-free binary codec or the
/// length-prefixed frame transport. Every variant here is fatal to whatever
/// session is reading the bytes: there is no partial-recovery path for a
/// corrupt frame or a malformed varint.
#[derive(Error, Debug)]
pub enum WireError {
    #[error("varint exceeds 10 bytes")]
    VarintTooLong,

    #[error("truncated varint")]
    TruncatedVarint,

    #[error("truncated LEN payload: wanted {wanted} bytes, had {had}")]
    TruncatedPayload { wanted: usize, had: usize },

    #[error("field number {0} out of range")]
    FieldNumberOutOfRange(u64),

    #[error("unknown wire type {0}")]
    UnknownWireType(u64),

    #[error("malformed trailer: {0}")]
    MalformedTrailer(String),

    #[error("grpc-status {status}: {message}")]
    TrailerStatus { status: i64, message: String },

    #[error("value is not a valid UTF-8 string")]
    InvalidUtf8,
}
