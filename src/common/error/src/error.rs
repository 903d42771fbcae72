//! Core error types for scella.

use thiserror::Error;

/// Result type alias using `ScellaError`.
pub type ScellaResult<T> = std::result::Result<T, ScellaError>;

/// Generic boxed error for external error sources.
pub type GenericError = Box<dyn std::error::Error + Send + Sync>;

/// Core error type for scella operations.
///
/// Note that an empty selection is *not* an error: extraction over a
/// selector that matches no entries returns an empty `RealizedMatrix`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScellaError {
    /// A selector referenced an unknown attribute or used a malformed
    /// predicate. Never retried; surfaced immediately.
    #[error("SelectorResolution: {0}")]
    SelectorResolution(String),

    /// A storage/query-engine call failed. Transient; the extractor
    /// retries these with backoff before surfacing them. `fragment`
    /// identifies the failing predicate fragment or window.
    #[error("StorageQuery[{fragment}]: {message}")]
    StorageQuery {
        /// Rendered description of the fragment/window that failed.
        fragment: String,
        /// Underlying failure message.
        message: String,
    },

    /// A tokenizer failed for a single row. Carries the row position so
    /// the loader can apply its skip-or-abort policy.
    #[error("Tokenization[row {row}]: {message}")]
    Tokenization {
        /// Identifier of the row that failed to tokenize.
        row: u64,
        /// Underlying failure message.
        message: String,
    },

    /// Invalid parameter provided.
    #[error("InvalidParameter: {0}")]
    InvalidParameter(String),

    /// Computation graph structure error (bad handle, invalid permutation).
    #[error("GraphError: {0}")]
    GraphError(String),

    /// Query execution error.
    #[error("ExecutionError: {0}")]
    ExecutionError(String),

    /// Internal error (bug in scella).
    #[error("InternalError: {0}")]
    InternalError(String),

    /// IO error.
    #[error("IoError: {0}")]
    IoError(#[from] std::io::Error),

    /// Arrow error from the columnar interchange layer.
    #[error("ArrowError: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// JSON serialization error.
    #[error("SerdeJsonError: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// External error from third-party libraries.
    #[error("ExternalError: {0}")]
    ExternalError(GenericError),
}

impl ScellaError {
    /// Create a new `SelectorResolution` error.
    pub fn selector<S: Into<String>>(msg: S) -> Self {
        Self::SelectorResolution(msg.into())
    }

    /// Create a new `StorageQuery` error attached to a fragment.
    pub fn storage<F: Into<String>, S: Into<String>>(fragment: F, msg: S) -> Self {
        Self::StorageQuery {
            fragment: fragment.into(),
            message: msg.into(),
        }
    }

    /// Create a new `Tokenization` error attached to a row.
    pub fn tokenization<S: Into<String>>(row: u64, msg: S) -> Self {
        Self::Tokenization {
            row,
            message: msg.into(),
        }
    }

    /// Create a new `InvalidParameter` error.
    pub fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Create a new `GraphError`.
    pub fn graph<S: Into<String>>(msg: S) -> Self {
        Self::GraphError(msg.into())
    }

    /// Create a new `ExecutionError`.
    pub fn execution<S: Into<String>>(msg: S) -> Self {
        Self::ExecutionError(msg.into())
    }

    /// Create a new `InternalError`.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::InternalError(msg.into())
    }

    /// Create a cancellation error (using `ExecutionError`).
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        Self::ExecutionError(format!("Cancelled: {}", msg.into()))
    }

    /// Whether a bounded retry at the extractor boundary is allowed for
    /// this error. Resolution and parameter errors fail fast.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StorageQuery { .. } | Self::IoError(_) | Self::ExternalError(_)
        )
    }
}

/// Ensure a condition holds, returning an error if not.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $msg:expr) => {
        if !$cond {
            return Err($crate::ScellaError::ExecutionError($msg.to_string()));
        }
    };
    ($cond:expr, $variant:ident: $($msg:tt)*) => {
        if !$cond {
            return Err($crate::ScellaError::$variant(format!($($msg)*)));
        }
    };
}

/// Return early with an `InvalidParameter` error.
#[macro_export]
macro_rules! param_err {
    ($($arg:tt)*) => {
        return Err($crate::ScellaError::InvalidParameter(format!($($arg)*)))
    };
}
