//! Error types for answer checking.
//!
//! Two failure families come out of a check: execution errors (the test
//! process could not run to completion) and I/O errors (copying, reading,
//! writing or deleting files). Everything else is a model error: the task
//! data does not match the document it describes.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::base::{LineCol, TextRange, TextSize};

/// Main error type for checker operations.
#[derive(Error, Debug)]
pub enum CheckError {
    /// File system operation failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Test process could not be started or died abnormally
    #[error("execution error: {0}")]
    Execution(String),

    /// Test process exceeded its wall-clock budget and was killed
    #[error("test process timed out after {0:?}")]
    Timeout(Duration),

    /// Check was cancelled by the caller
    #[error("check cancelled")]
    Cancelled,

    /// No placeholder with this index in the task file
    #[error("placeholder #{0} not found")]
    PlaceholderNotFound(usize),

    /// Range does not fit the document or splits a character
    #[error("range {range:?} is invalid for a document of length {len:?}")]
    InvalidRange { range: TextRange, len: TextSize },

    /// Line/column position does not exist in the document
    #[error("position {0} is outside the document")]
    InvalidPosition(LineCol),

    /// Document has no file to save to
    #[error("document has no backing file")]
    NoBackingFile,

    /// Configuration could not be read
    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`CheckError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    Execution,
    Model,
}

impl CheckError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CheckError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckError::Io { .. } => ErrorKind::Io,
            CheckError::Execution(_) | CheckError::Timeout(_) | CheckError::Cancelled => {
                ErrorKind::Execution
            }
            CheckError::PlaceholderNotFound(_)
            | CheckError::InvalidRange { .. }
            | CheckError::InvalidPosition(_)
            | CheckError::NoBackingFile
            | CheckError::Config(_) => ErrorKind::Model,
        }
    }
}

/// Result type alias for checker operations.
pub type Result<T> = std::result::Result<T, CheckError>;
