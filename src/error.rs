//! Unified error handling for the livekml library.
//!
//! Only store access and serving failures are errors. Bad request parameters
//! fall back to defaults and undefined metrics fall back to the below-target
//! classification, so neither ever shows up here.

use thiserror::Error;

/// Unified error type for livekml operations.
#[derive(Debug, Error)]
pub enum LiveKmlError {
    /// The backing store could not be opened
    #[error("Error opening database {path}: {message}")]
    StoreOpen { path: String, message: String },

    /// The store identifier tried to leave the data directory
    #[error("Error opening database {name}: not a plain file name")]
    InvalidStoreName { name: String },

    /// The sample query could not be prepared
    #[error("Couldn't prepare statement\n{sql}\n{message}")]
    QueryPrepare { sql: String, message: String },

    /// A row could not be read while the query was running
    #[error("Query failed: {message}")]
    Query { message: String },

    /// The HTTP listener could not be started
    #[error("Server error: {message}")]
    Server { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for livekml operations.
pub type Result<T> = std::result::Result<T, LiveKmlError>;
