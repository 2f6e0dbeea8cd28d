//! Error types for the evaluation engine.
//!
//! Only [`EvalError::Configuration`] (and I/O or JSON failures while loading inputs) leaves the
//! public evaluation API. Comparator failures, structural mismatches and missing sections are
//! converted into outcomes and diagnostics at the per-attribute or per-section boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    /// Malformed attribute configuration; fatal for the document class.
    #[error("configuration error at {path}: {message}")]
    Configuration { path: String, message: String },
    /// An external comparator call failed.
    #[error("comparator failure ({method}): {source}")]
    ComparatorFailure {
        method: String,
        #[source]
        source: ServiceError,
    },
    /// A value's runtime shape disagrees with its declared attribute type.
    #[error("structural mismatch at {path}: expected {expected}, found {found}")]
    StructuralMismatch {
        path: String,
        expected: String,
        found: String,
    },
    /// Actual or expected data is missing for a whole section.
    #[error("missing input for section {section_id}: {message}")]
    MissingInput { section_id: String, message: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EvalError {
    pub fn configuration(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Failure classes for calls to the LLM and embedding services.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    /// Timeouts, connection resets, throttling and 5xx responses; eligible for one retry.
    #[error("transient service failure: {0}")]
    Transient(String),
    /// The service answered but refused the request.
    #[error("service rejected request: {0}")]
    Rejected(String),
    /// The service answered with something that could not be interpreted.
    #[error("malformed service response: {0}")]
    MalformedResponse(String),
    /// No service is configured.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;
