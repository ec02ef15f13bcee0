//! Error types for mapper operations.
//!
//! All public APIs return `OrmResult<T>`, an alias for
//! `Result<T, OrmError>`. Backend failures arrive as [`AdapterError`] and
//! are passed through unchanged inside [`OrmError::Adapter`].
//!
//! # Error Handling Example
//!
//! ```
//! use netabase_orm::error::{OrmError, OrmResult};
//!
//! fn example_operation() -> OrmResult<()> {
//!     Err(OrmError::NotFound("Post#7".to_string()))
//! }
//!
//! match example_operation() {
//!     Ok(()) => println!("Success!"),
//!     Err(OrmError::Validation(e)) => eprintln!("invalid: {:?}", e.codes()),
//!     Err(OrmError::PermissionDenied(what)) => eprintln!("denied: {what}"),
//!     Err(OrmError::NotFound(what)) => eprintln!("missing: {what}"),
//!     Err(e) => eprintln!("other: {e}"),
//! }
//! ```

use indexmap::IndexMap;
use thiserror::Error;

use crate::validation::Errors;

/// Result type alias for mapper operations.
pub type OrmResult<T> = Result<T, OrmError>;

/// Result type alias for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// The main error type.
#[derive(Error, Debug)]
pub enum OrmError {
    /// An instance failed validation inside create/save/update.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A related record's foreign key does not point back at its owner.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A relation-scoped lookup found no record at all.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Programmer error: unknown relation, scope or model, missing identity
    /// argument, unconfigured resource URL, closed connection.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Anything the storage backend reports.
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// Raised by hooks to abort the operation they guard.
    #[error("Aborted: {0}")]
    Aborted(String),

    /// Custom error with a message
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    pub fn is_validation(&self) -> bool {
        matches!(self, OrmError::Validation(_))
    }

    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            OrmError::Validation(e) => Some(e),
            _ => None,
        }
    }
}

/// Validation failure carrying the model name and the failing
/// attribute -> codes/messages maps.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("The `{model}` instance is not valid. Details: {}", describe(.errors))]
pub struct ValidationError {
    pub model: String,
    pub errors: Errors,
}

impl ValidationError {
    pub fn new(model: impl Into<String>, errors: Errors) -> Self {
        Self {
            model: model.into(),
            errors,
        }
    }

    /// Attribute -> failure codes (`presence`, `length.min`, ...).
    pub fn codes(&self) -> &IndexMap<String, Vec<String>> {
        self.errors.codes()
    }

    pub fn has_code(&self, attr: &str, code: &str) -> bool {
        self.codes()
            .get(attr)
            .is_some_and(|codes| codes.iter().any(|c| c == code))
    }
}

fn describe(errors: &Errors) -> String {
    errors
        .messages()
        .iter()
        .flat_map(|(attr, messages)| messages.iter().map(move |m| format!("`{attr}` {m}")))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors reported by storage adapters.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Free-form backend failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// The adapter does not implement an optional operation
    #[error("Operation `{operation}` is not supported by the {adapter} adapter")]
    Unsupported {
        adapter: &'static str,
        operation: &'static str,
    },

    /// Row (de)serialization failed
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// Wraps errors from the sled database
    #[cfg(feature = "sled")]
    #[error(transparent)]
    Sled(#[from] sled::Error),

    /// Internal lock was poisoned
    #[error("Lock error: {0}")]
    Lock(String),
}
