//! # keystone-common
//!
//! Common types, errors, and configuration for Keystone.
//!
//! This crate provides the foundational pieces shared by the transaction
//! driver and by resource adapters:
//!
//! - **Types**: Identifiers for transactions (`TxnId`) and savepoints (`SavepointId`)
//! - **Errors**: The `TransactionError` taxonomy with stable error codes
//! - **Config**: `TransactionManagerConfig`, loadable from TOML
//!
//! ## Example
//!
//! ```rust
//! use keystone_common::error::{TransactionError, TxResult};
//! use keystone_common::types::TxnId;
//!
//! fn check_handle(expected: TxnId, presented: TxnId) -> TxResult<()> {
//!     if expected != presented {
//!         return Err(TransactionError::invalid_argument("not the same transaction"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_handle(TxnId::new(1), TxnId::new(1)).is_ok());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used items at the crate root
pub use config::TransactionManagerConfig;
pub use error::{ErrorCode, TransactionError, TxResult};
pub use types::{SavepointId, TxnId};
