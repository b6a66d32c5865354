//! Error types for IdChain.
//!
//! All errors are strongly typed using thiserror. The taxonomy is closed:
//! callers match exhaustively instead of inspecting error shapes by field.

use thiserror::Error;

use crate::contact::ContactId;
use crate::storage::StorageError;

/// Validation errors raised before any store access.
///
/// These are never retried; the input will not change on retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Neither email nor phone was supplied.
    #[error("at least one of email or phone must be supplied")]
    MissingIdentifiers,

    /// The supplied email does not look like an email address.
    #[error("malformed email address: {value}")]
    InvalidEmail {
        /// The rejected input.
        value: String,
    },

    /// The supplied phone number contains characters outside the accepted set.
    #[error("malformed phone number: {value}")]
    InvalidPhone {
        /// The rejected input.
        value: String,
    },

    /// An identifier exceeds the maximum accepted length.
    #[error("{field} exceeds maximum length of {max_length} bytes")]
    FieldTooLong {
        /// Name of the offending field.
        field: &'static str,
        /// The enforced limit.
        max_length: usize,
    },
}

/// Execution errors raised while resolving against the store.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// No non-deleted record exists for the given id.
    #[error("contact not found: {id}")]
    ContactNotFound {
        /// The id that failed to resolve.
        id: ContactId,
    },

    /// Consolidation was attempted over zero members.
    ///
    /// Never expected from `resolve`; reachable from direct chain lookups
    /// when a chain's membership has been emptied underneath the caller.
    #[error("consolidation attempted over an empty chain")]
    EmptyChain,

    /// A store operation failed transiently (timeout, connection loss, or a
    /// constraint violation from a lost race). Retryable.
    #[error("store unavailable: {message}")]
    StoreUnavailable {
        /// Backend detail.
        message: String,
    },

    /// A batch relink could not be applied atomically. No mixed state was
    /// left behind; the whole resolve must be retried from the match step.
    #[error("batch relink conflict: {message}")]
    Conflict {
        /// Backend detail.
        message: String,
    },
}

impl From<StorageError> for ExecutionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ContactNotFound(id) => Self::ContactNotFound { id },
            StorageError::BatchConflict(message) => Self::Conflict { message },
            StorageError::DuplicateKey(_)
            | StorageError::InvalidRecord(_)
            | StorageError::BackendError(_)
            | StorageError::Timeout { .. } => Self::StoreUnavailable {
                message: err.to_string(),
            },
        }
    }
}

/// Top-level error type for IdChain.
///
/// This enum encompasses all possible errors that can occur when resolving
/// identities or looking up chains.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Input was rejected before any store access.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Resolution failed against the store.
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Unexpected internal state.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the broken invariant.
        message: String,
    },
}

impl IdentityError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this error means the requested record does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Execution(ExecutionError::ContactNotFound { .. })
        )
    }

    /// Returns true if retrying the whole call may succeed.
    ///
    /// Store unavailability is transient by definition. A batch conflict
    /// leaves no mixed state behind, so re-running the call from the match
    /// step is the documented recovery. Validation and not-found errors do
    /// not change on retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) | Self::Internal { .. } => false,
            Self::Execution(e) => matches!(
                e,
                ExecutionError::StoreUnavailable { .. } | ExecutionError::Conflict { .. }
            ),
        }
    }
}

impl From<StorageError> for IdentityError {
    fn from(err: StorageError) -> Self {
        Self::Execution(err.into())
    }
}

/// Result type alias for IdChain operations.
pub type ChainResult<T> = Result<T, IdentityError>;
