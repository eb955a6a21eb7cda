use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LossValuationError {
    #[error("Invalid format: {0}")]
    FormatError(String),

    #[error("Value out of range: {0}")]
    RangeError(String),

    #[error("Insufficient span: {0}")]
    InsufficientSpanError(String),

    #[error("Model fit failed: {0}")]
    ModelFitError(String),

    #[error("Invalid discount rate {0}: must be finite and greater than -1")]
    InvalidRateError(f64),

    #[error("Missing field '{field}' in {category} item #{index}")]
    MissingFieldError {
        category: String,
        index: usize,
        field: &'static str,
    },

    #[error("Invalid field '{field}' in {category} item #{index}: {details}")]
    InvalidFieldError {
        category: String,
        index: usize,
        field: &'static str,
        details: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Machine-readable tag for each error variant, so a transport layer can map
/// failures to structured responses without inspecting messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Format,
    Range,
    InsufficientSpan,
    ModelFit,
    InvalidRate,
    MissingField,
    InvalidField,
    Serialization,
    Io,
}

impl LossValuationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FormatError(_) => ErrorKind::Format,
            Self::RangeError(_) => ErrorKind::Range,
            Self::InsufficientSpanError(_) => ErrorKind::InsufficientSpan,
            Self::ModelFitError(_) => ErrorKind::ModelFit,
            Self::InvalidRateError(_) => ErrorKind::InvalidRate,
            Self::MissingFieldError { .. } => ErrorKind::MissingField,
            Self::InvalidFieldError { .. } => ErrorKind::InvalidField,
            Self::SerializationError(_) => ErrorKind::Serialization,
            Self::IoError(_) => ErrorKind::Io,
        }
    }

    /// True when the caller's input is at fault. Model fit failures can stem from
    /// either a degenerate series or the numerics, so they are not counted here.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::ModelFit | ErrorKind::Serialization | ErrorKind::Io
        )
    }
}

pub type Result<T> = std::result::Result<T, LossValuationError>;
