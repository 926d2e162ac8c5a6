use shared::s3::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EtlError>;

/// Everything that can end an invocation early.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("failed to fetch data from API: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid API response format: {0}")]
    Format(String),

    #[error("data transformation failed: {0}")]
    Transform(String),

    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl EtlError {
    pub fn kind(&self) -> &'static str {
        match self {
            EtlError::Network(_) => "NetworkError",
            EtlError::Format(_) => "FormatError",
            EtlError::Transform(_) => "TransformError",
            EtlError::Config(_) => "ConfigError",
            EtlError::Storage(_) => "StorageError",
        }
    }
}
