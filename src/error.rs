use thiserror::Error;

#[derive(Debug, Error)]
pub enum MpmError {
    #[error("Unknown material kind: {0:?}")]
    UnknownMaterial(String),

    #[error("Unknown geometry kind: {0:?}")]
    UnknownGeometry(String),

    #[error("Configuration dimension {expected} does not match {what} dimension {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid color: expected 3 or 4 components, found {0}")]
    InvalidColor(usize),

    #[error("Scene contains no objects")]
    EmptyScene,

    #[error("Object {object} brings the particle count to {requested}, exceeding the pool capacity of {capacity}")]
    CapacityOverflow {
        object: usize,
        requested: usize,
        capacity: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MessagePack encoding error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

pub type Result<T> = std::result::Result<T, MpmError>;
