use thiserror::Error;

/// Error taxonomy for the docking engine.
///
/// `BadArgument` and `InvalidRequest` indicate caller mistakes and are never
/// retried. `Assertion` indicates an internal invariant violation and is
/// fatal to the current run.
#[derive(Debug, Error)]
pub enum DockError {
    #[error("bad argument: {0}")]
    BadArgument(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("file error: {0}")]
    File(String),
    #[error("missing parameter: {0}")]
    MissingParameter(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("model error: {0}")]
    Model(String),
    #[error("assertion failed: {0}")]
    Assertion(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DockError>;

impl DockError {
    pub fn bad_argument(msg: impl Into<String>) -> Self {
        DockError::BadArgument(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        DockError::InvalidRequest(msg.into())
    }
}
