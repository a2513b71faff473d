use thiserror::Error;

/// Main error type for apiary operations
#[derive(Error, Debug)]
pub enum ApiaryError {
    #[error("Database corrupt: {0}")]
    Corruption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for apiary operations
pub type Result<T> = std::result::Result<T, ApiaryError>;

impl ApiaryError {
    /// Shorthand for building a corruption error from any displayable message
    pub fn corrupt(msg: impl Into<String>) -> Self {
        ApiaryError::Corruption(msg.into())
    }

    /// Check if this error indicates damaged on-disk data rather than an
    /// environmental failure
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            ApiaryError::Corruption(_) | ApiaryError::Serialization(_)
        )
    }
}
