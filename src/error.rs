//! Error types for the Tessera library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`TesseraError`] enum.
//!
//! # Examples
//!
//! ```
//! use tessera::error::{Result, TesseraError};
//!
//! fn example_operation() -> Result<()> {
//!     Err(TesseraError::invalid_argument("Invalid input"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Tessera operations.
#[derive(Error, Debug)]
pub enum TesseraError {
    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A snapshot exists but could not be decoded (bad header, checksum,
    /// compression stream or encoding).
    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// A snapshot exists but could not be read.
    #[error("Load failed: {0}")]
    LoadFailed(String),

    /// A snapshot write failed.
    #[error("Save failed: {0}")]
    SaveFailed(String),

    /// The pluggable record store reported an error.
    #[error("Backend failed: {0}")]
    BackendFailed(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with TesseraError.
pub type Result<T> = std::result::Result<T, TesseraError>;

impl TesseraError {
    /// Create a new corrupt snapshot error.
    pub fn corrupt_snapshot<S: Into<String>>(msg: S) -> Self {
        TesseraError::CorruptSnapshot(msg.into())
    }

    /// Create a new load failure.
    pub fn load_failed<S: Into<String>>(msg: S) -> Self {
        TesseraError::LoadFailed(msg.into())
    }

    /// Create a new save failure.
    pub fn save_failed<S: Into<String>>(msg: S) -> Self {
        TesseraError::SaveFailed(msg.into())
    }

    /// Create a new backend failure.
    pub fn backend<S: Into<String>>(msg: S) -> Self {
        TesseraError::BackendFailed(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        TesseraError::Storage(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        TesseraError::Other(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        TesseraError::Other(format!("Invalid argument: {}", msg.into()))
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        TesseraError::Other(format!("Invalid configuration: {}", msg.into()))
    }

    /// Create a new not found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        TesseraError::Other(format!("Not found: {}", msg.into()))
    }
}
