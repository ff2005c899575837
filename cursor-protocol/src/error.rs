use cursor_wire::WireError;

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("message missing required field {field} in {message}")]
    MissingField {
        message: &'static str,
        field: &'static str,
    },

    #[error("{message}.{field} had an unexpected shape")]
    WrongShape {
        message: &'static str,
        field: &'static str,
    },

    #[error("unrecognized oneof variant in {message} (all known fields absent)")]
    UnknownVariant { message: &'static str },
}

pub type Result<T> = std::result::Result<T, SchemaError>;
