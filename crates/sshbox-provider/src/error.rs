//! Error types for the container-engine client

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Failed to reach container engine: {0}")]
    Unreachable(String),

    #[error("Container engine rejected the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Build failed: {0}")]
    Build(String),

    #[error("Invalid engine address: {0}")]
    InvalidEndpoint(String),
}

impl EngineError {
    /// Transport-level failure; the whole operation may be retried
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::InvalidEndpoint(_))
    }
}

impl From<bollard::errors::Error> for EngineError {
    fn from(e: bollard::errors::Error) -> Self {
        use bollard::errors::Error;

        match e {
            Error::DockerResponseServerError {
                status_code: 404,
                message,
            } => Self::NotFound(message),
            Error::DockerResponseServerError {
                status_code,
                message,
            } => Self::Rejected {
                status: status_code,
                message,
            },
            other => Self::Unreachable(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
