//! Transaction error types.
//!
//! Every failure the driver or an adapter can report is a variant of
//! [`TransactionError`]. Each variant maps to a stable [`ErrorCode`].

use std::fmt;
use thiserror::Error;

/// Error codes for categorizing errors.
///
/// These codes can be used for programmatic error handling and
/// are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Adapter-internal failure.
    System = 0x0001,
    /// Invalid argument provided, e.g. a foreign transaction handle.
    InvalidArgument = 0x0003,
    /// Invalid configuration.
    InvalidConfig = 0x0006,

    // Lifecycle errors (0x0300 - 0x03FF)
    /// A new transaction could not be created.
    CannotCreateTransaction = 0x0300,
    /// The call is incompatible with the current transaction state.
    IllegalTransactionState = 0x0301,
    /// The transaction was rolled back although commit was requested.
    UnexpectedRollback = 0x0302,
    /// Commit failed and the follow-up rollback failed as well.
    CommitRollbackFailed = 0x0303,
    /// The adapter cannot suspend or resume transactions.
    SuspensionNotSupported = 0x0304,
    /// Invalid transaction timeout.
    InvalidTimeout = 0x0305,

    // Savepoint errors (0x0700 - 0x07FF)
    /// Nested transactions are not supported.
    NestedTransactionNotSupported = 0x0700,
    /// Savepoint API misuse, e.g. a token from another transaction.
    TransactionUsage = 0x0701,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x03 => "Transaction",
            0x07 => "Savepoint",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The error type of the transaction manager and its resource adapters.
///
/// # Example
///
/// ```rust
/// use keystone_common::error::{ErrorCode, TransactionError, TxResult};
///
/// fn begin() -> TxResult<()> {
///     Err(TransactionError::cannot_create("connection pool exhausted"))
/// }
///
/// assert_eq!(begin().unwrap_err().code(), ErrorCode::CannotCreateTransaction);
/// ```
#[derive(Debug, Error)]
pub enum TransactionError {
    // ==========================================================================
    // Lifecycle Errors
    // ==========================================================================
    /// The adapter could not start a new transaction.
    #[error("cannot create transaction: {reason}")]
    CannotCreateTransaction {
        /// Reason reported by the adapter.
        reason: String,
    },

    /// The call is incompatible with the current transaction state.
    #[error("illegal transaction state: {message}")]
    IllegalTransactionState {
        /// Error message.
        message: String,
    },

    /// Commit was requested but the transaction was rolled back instead.
    #[error("unexpected rollback: {message}")]
    UnexpectedRollback {
        /// Error message.
        message: String,
    },

    /// Commit failed, and rolling back after it failed as well.
    #[error("commit failed ({commit}) and subsequent rollback failed: {rollback}")]
    CommitRollbackFailed {
        /// The original commit failure.
        commit: Box<TransactionError>,
        /// The rollback failure that followed it.
        #[source]
        rollback: Box<TransactionError>,
    },

    /// The adapter does not support suspending or resuming transactions.
    #[error("transaction suspension not supported: {reason}")]
    TransactionSuspensionNotSupported {
        /// Reason for the failure.
        reason: String,
    },

    /// The requested timeout is not usable.
    #[error("invalid transaction timeout: {timeout_secs}s")]
    InvalidTimeout {
        /// The rejected timeout in seconds.
        timeout_secs: u64,
    },

    // ==========================================================================
    // Savepoint Errors
    // ==========================================================================
    /// Nesting was requested but cannot be honoured.
    #[error("nested transaction not supported: {reason}")]
    NestedTransactionNotSupported {
        /// Reason for the failure.
        reason: String,
    },

    /// Savepoint API misuse.
    #[error("transaction usage error: {message}")]
    TransactionUsage {
        /// Error message.
        message: String,
    },

    // ==========================================================================
    // General Errors
    // ==========================================================================
    /// Invalid argument, e.g. a handle that was not issued for this attempt.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Error message.
        message: String,
    },

    /// Adapter-internal failure (I/O, driver error, timeout).
    #[error("transaction system error: {message}")]
    System {
        /// Error message.
        message: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },
}

impl TransactionError {
    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::CannotCreateTransaction { .. } => ErrorCode::CannotCreateTransaction,
            Self::IllegalTransactionState { .. } => ErrorCode::IllegalTransactionState,
            Self::UnexpectedRollback { .. } => ErrorCode::UnexpectedRollback,
            Self::CommitRollbackFailed { .. } => ErrorCode::CommitRollbackFailed,
            Self::TransactionSuspensionNotSupported { .. } => ErrorCode::SuspensionNotSupported,
            Self::InvalidTimeout { .. } => ErrorCode::InvalidTimeout,
            Self::NestedTransactionNotSupported { .. } => {
                ErrorCode::NestedTransactionNotSupported
            }
            Self::TransactionUsage { .. } => ErrorCode::TransactionUsage,
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::System { .. } => ErrorCode::System,
            Self::InvalidConfig { .. } => ErrorCode::InvalidConfig,
        }
    }

    /// Returns true if this error means the transaction ended in a rollback.
    #[must_use]
    pub const fn is_rollback(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedRollback { .. } | Self::CommitRollbackFailed { .. }
        )
    }

    /// Creates a cannot-create-transaction error.
    #[must_use]
    pub fn cannot_create(reason: impl Into<String>) -> Self {
        Self::CannotCreateTransaction {
            reason: reason.into(),
        }
    }

    /// Creates an illegal-transaction-state error.
    #[must_use]
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalTransactionState {
            message: message.into(),
        }
    }

    /// Creates an unexpected-rollback error.
    #[must_use]
    pub fn unexpected_rollback(message: impl Into<String>) -> Self {
        Self::UnexpectedRollback {
            message: message.into(),
        }
    }

    /// Creates a nested-transaction-not-supported error.
    #[must_use]
    pub fn nested_not_supported(reason: impl Into<String>) -> Self {
        Self::NestedTransactionNotSupported {
            reason: reason.into(),
        }
    }

    /// Creates a suspension-not-supported error.
    #[must_use]
    pub fn suspension_not_supported(reason: impl Into<String>) -> Self {
        Self::TransactionSuspensionNotSupported {
            reason: reason.into(),
        }
    }

    /// Creates a transaction usage error.
    #[must_use]
    pub fn usage(message: impl Into<String>) -> Self {
        Self::TransactionUsage {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a system error.
    #[must_use]
    pub fn system(message: impl Into<String>) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    /// Combines a commit failure with the rollback failure that followed it.
    #[must_use]
    pub fn commit_rollback_failed(commit: TransactionError, rollback: TransactionError) -> Self {
        Self::CommitRollbackFailed {
            commit: Box::new(commit),
            rollback: Box::new(rollback),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_code() {
        let err = TransactionError::cannot_create("pool exhausted");
        assert_eq!(err.code(), ErrorCode::CannotCreateTransaction);
        assert_eq!(err.code().category(), "Transaction");

        let err = TransactionError::nested_not_supported("no savepoints");
        assert_eq!(err.code().category(), "Savepoint");

        assert_eq!(
            TransactionError::system("io").code().category(),
            "General"
        );
    }

    #[test]
    fn test_error_display() {
        let err = TransactionError::illegal_state("already completed");
        assert_eq!(
            err.to_string(),
            "illegal transaction state: already completed"
        );

        let err = TransactionError::InvalidTimeout { timeout_secs: 0 };
        assert_eq!(err.to_string(), "invalid transaction timeout: 0s");
    }

    #[test]
    fn test_commit_rollback_failed_keeps_both() {
        let err = TransactionError::commit_rollback_failed(
            TransactionError::system("disk full"),
            TransactionError::system("connection lost"),
        );
        assert_eq!(err.code(), ErrorCode::CommitRollbackFailed);
        assert!(err.to_string().contains("disk full"));
        assert!(err.to_string().contains("connection lost"));
        let source = err.source().map(ToString::to_string);
        assert_eq!(
            source.as_deref(),
            Some("transaction system error: connection lost")
        );
        assert!(err.is_rollback());
    }

    #[test]
    fn test_code_values_are_stable() {
        assert_eq!(ErrorCode::CannotCreateTransaction.as_u16(), 0x0300);
        assert_eq!(ErrorCode::NestedTransactionNotSupported.as_u16(), 0x0700);
        assert_eq!(ErrorCode::InvalidArgument.to_string(), "InvalidArgument");
    }
}
