//! Centralized error handling for cds2nmme
//!
//! Every failure in a conversion batch surfaces as a [`ConvertError`] and is
//! propagated to the caller; nothing is retried or skipped.

use std::fmt;

/// Main error type for conversion operations
#[derive(Debug)]
pub enum ConvertError {
    /// NetCDF file operation errors
    NetCDFError(netcdf::Error),

    /// I/O operation errors
    IoError(std::io::Error),

    /// Array shape or dimension error
    ArrayError(ndarray::ShapeError),

    /// Variable not found in dataset
    VariableNotFound { var: String },

    /// Dimension not found in dataset
    DimensionNotFound { dim: String },

    /// Rename source names neither a dimension nor a variable
    LabelNotFound { label: String },

    /// Rename target is already taken
    LabelExists { label: String },

    /// Coordinate used for nearest lookup is neither increasing nor decreasing
    NonMonotonicIndex { dim: String },

    /// Variable type that cannot be decoded to floating point
    UnsupportedType { var: String, vartype: String },

    /// Directory entry whose name is not valid UTF-8
    InvalidFileName { path: String },
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::NetCDFError(e) => write!(f, "NetCDF error: {}", e),
            ConvertError::IoError(e) => write!(f, "I/O error: {}", e),
            ConvertError::ArrayError(e) => write!(f, "Array error: {}", e),
            ConvertError::VariableNotFound { var } => {
                write!(f, "Variable '{}' not found in dataset", var)
            }
            ConvertError::DimensionNotFound { dim } => {
                write!(f, "Dimension '{}' not found in dataset", dim)
            }
            ConvertError::LabelNotFound { label } => write!(
                f,
                "Cannot rename '{}': it is not a variable or dimension in this dataset",
                label
            ),
            ConvertError::LabelExists { label } => {
                write!(f, "Cannot rename to '{}': name already in use", label)
            }
            ConvertError::NonMonotonicIndex { dim } => write!(
                f,
                "Coordinate '{}' must be monotonic increasing or decreasing for nearest lookup",
                dim
            ),
            ConvertError::UnsupportedType { var, vartype } => {
                write!(f, "Variable '{}' has unsupported type {}", var, vartype)
            }
            ConvertError::InvalidFileName { path } => {
                write!(f, "File name is not valid UTF-8: {}", path)
            }
        }
    }
}

impl std::error::Error for ConvertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConvertError::NetCDFError(e) => Some(e),
            ConvertError::IoError(e) => Some(e),
            ConvertError::ArrayError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<netcdf::Error> for ConvertError {
    fn from(error: netcdf::Error) -> Self {
        ConvertError::NetCDFError(error)
    }
}

impl From<std::io::Error> for ConvertError {
    fn from(error: std::io::Error) -> Self {
        ConvertError::IoError(error)
    }
}

impl From<ndarray::ShapeError> for ConvertError {
    fn from(error: ndarray::ShapeError) -> Self {
        ConvertError::ArrayError(error)
    }
}

/// Result type alias for conversion operations
pub type Result<T> = std::result::Result<T, ConvertError>;
