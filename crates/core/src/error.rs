//! Error types for skiroute

use thiserror::Error;

/// Broad category of an [`Error`].
///
/// Validation and configuration errors are fatal and raised before any
/// output is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Inputs do not fit together (shape, georeference, missing entries)
    Validation,
    /// A configuration value is malformed or out of its domain
    Configuration,
    /// Failure reported by the operating system
    Io,
    /// Anything else
    Internal,
}

/// Main error type for skiroute operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Shape mismatch for '{layer}': expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        layer: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Georeference mismatch for '{layer}': expected {expected:?}, got {actual:?}")]
    GeoreferenceMismatch {
        layer: String,
        expected: [f64; 6],
        actual: [f64; 6],
    },

    #[error("CRS mismatch for '{layer}': expected {expected}, got {actual}")]
    CrsMismatch {
        layer: String,
        expected: String,
        actual: String,
    },

    #[error("Sum of weights must be > 0, got {0}")]
    NonPositiveTotalWeight(f64),

    #[error("Required raster layer '{0}' was not supplied")]
    MissingLayer(String),

    #[error("Required mask '{0}' was not supplied")]
    MissingMask(String),

    #[error("No weight configured for layer '{0}'")]
    MissingWeight(String),

    #[error("Operation '{0}' needs at least one input grid")]
    EmptyInput(&'static str),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build an [`Error::InvalidParameter`]
    pub fn invalid_parameter(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::InvalidDimensions { .. }
            | Error::IndexOutOfBounds { .. }
            | Error::SizeMismatch { .. }
            | Error::ShapeMismatch { .. }
            | Error::GeoreferenceMismatch { .. }
            | Error::CrsMismatch { .. }
            | Error::NonPositiveTotalWeight(_)
            | Error::MissingLayer(_)
            | Error::MissingMask(_)
            | Error::MissingWeight(_)
            | Error::EmptyInput(_) => ErrorKind::Validation,
            Error::InvalidParameter { .. } | Error::Config(_) => ErrorKind::Configuration,
            Error::Other(_) => ErrorKind::Internal,
        }
    }
}

/// Result type alias for skiroute operations
pub type Result<T> = std::result::Result<T, Error>;
