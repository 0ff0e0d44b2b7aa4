//! Error types for the Vicinity library.
//!
//! All fallible operations return [`VicinityError`] through the [`Result`]
//! alias. The variants keep "operation not applicable" outcomes (an unknown
//! label, a resize below the live count, a full index) distinct from
//! internal failures, so callers can branch on the kind instead of a bare
//! boolean.

use std::io;

use anyhow;
use thiserror::Error;

use crate::registry::Label;

/// The main error type for Vicinity operations.
#[derive(Error, Debug)]
pub enum VicinityError {
    /// I/O errors (snapshot files, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid index configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A label-keyed operation targeted a label that was never inserted.
    #[error("Unknown label: {0}")]
    UnknownLabel(Label),

    /// The index is full and cannot accept another point.
    #[error("Capacity exhausted: index is full at {capacity} elements")]
    CapacityExhausted {
        /// Current maximum element count.
        capacity: usize,
    },

    /// A resize would truncate live data.
    #[error("Resize too small: requested {requested}, {current} elements stored")]
    ResizeTooSmall {
        /// Requested new capacity.
        requested: usize,
        /// Current stored element count.
        current: usize,
    },

    /// A persisted index image is unreadable or malformed.
    #[error("Corrupted index image: {0}")]
    Corrupted(String),

    /// Internal engine failure.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with VicinityError.
pub type Result<T> = std::result::Result<T, VicinityError>;

impl VicinityError {
    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        VicinityError::Config(msg.into())
    }

    /// Create a new corrupted-image error.
    pub fn corrupted<S: Into<String>>(msg: S) -> Self {
        VicinityError::Corrupted(msg.into())
    }

    /// Create a new internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        VicinityError::Internal(msg.into())
    }
}
