//! Error types
//!
//! Duplication itself is total: unsupported value kinds degrade to a boolean
//! projection, unsupported handles to null, unresolved closure scopes to
//! "unbound". Contract violations (mutating an immutable container,
//! requesting a code unit before its permanent form exists, reference-count
//! underflow) panic. The error surface below covers the registration
//! operations, which can genuinely fail.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from context registration operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The callable table already holds an entry under this name
    #[error("callable table already contains an entry named {name:?}")]
    NameExists { name: String },

    /// The name was not present in the callable table
    #[error("callable table has no entry named {name:?}")]
    NameMissing { name: String },
}

impl Error {
    pub fn name_exists(name: impl Into<String>) -> Self {
        Self::NameExists { name: name.into() }
    }

    pub fn name_missing(name: impl Into<String>) -> Self {
        Self::NameMissing { name: name.into() }
    }
}
