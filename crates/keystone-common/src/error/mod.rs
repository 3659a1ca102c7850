//! Error handling for Keystone.
//!
//! This module provides the error taxonomy and result alias shared by the
//! transaction driver and every resource adapter.

mod transaction;

pub use transaction::{ErrorCode, TransactionError};

/// Result type alias for transaction operations.
pub type TxResult<T> = std::result::Result<T, TransactionError>;
