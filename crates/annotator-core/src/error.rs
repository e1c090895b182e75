use thiserror::Error;

use crate::input::RejectReason;

#[derive(Error, Debug)]
pub enum AnnotatorError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid scale: container width {container_width} must be positive and finite")]
    InvalidScale { container_width: f64 },

    #[error("Invalid annotation: {0}")]
    InvalidAnnotation(String),

    #[error("Failed to decode signature image: {0}")]
    ImageDecode(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("File rejected: {0}")]
    InputRejected(RejectReason),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}
