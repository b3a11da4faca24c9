use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulator unreachable: {0}")]
    Unreachable(String),
    #[error("simulator rejected write to {path}: {reason}")]
    Rejected { path: String, reason: String },
    #[error("unknown endpoint: {0}")]
    UnknownPath(String),
    #[error("simulator timeout")]
    Timeout,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
