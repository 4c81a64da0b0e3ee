use tch::TchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimilarityError {
    #[error("Shape mismatch error: {0}")]
    ShapeMismatch(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Tch tensor error: {0}")]
    TchError(String),

    #[error("Invalid configuration error: {0}")]
    InvalidConfigurationError(String),

    #[error("Value error: {0}")]
    ValueError(String),
}

impl From<std::io::Error> for SimilarityError {
    fn from(error: std::io::Error) -> Self {
        SimilarityError::IOError(error.to_string())
    }
}

impl From<serde_json::Error> for SimilarityError {
    fn from(error: serde_json::Error) -> Self {
        SimilarityError::InvalidConfigurationError(error.to_string())
    }
}

impl From<TchError> for SimilarityError {
    fn from(error: TchError) -> Self {
        SimilarityError::TchError(error.to_string())
    }
}
