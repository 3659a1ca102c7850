//! # keystone-txn
//!
//! Platform transaction manager for Keystone.
//!
//! This crate provides a resource-agnostic transaction driver with:
//!
//! - **Transaction Lifecycle**: Begin, commit, rollback and rollback-only
//!   marking, routed to the right resource primitive for each attempt.
//!
//! - **Propagation**: Join, create, suspend or nest depending on whether a
//!   transaction already exists.
//!
//! - **Savepoints**: Nested transactions emulated with savepoints on the
//!   enclosing transaction.
//!
//! - **Resource Adapters**: A single trait a concrete resource implements to
//!   be driven by the manager.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                  TransactionTemplate (optional)                │
//! │                              │                                 │
//! │                              ▼                                 │
//! │                      TransactionManager                        │
//! │            begin / commit / rollback / set_rollback_only       │
//! │                              │                                 │
//! │          ┌───────────────────┼───────────────────┐             │
//! │          ▼                   ▼                   ▼             │
//! │ ┌──────────────────┐ ┌───────────────┐ ┌──────────────────┐   │
//! │ │TransactionStatus │ │   Savepoint   │ │ TransactionStats │   │
//! │ │   (per attempt)  │ │  sub-protocol │ │                  │   │
//! │ └──────────────────┘ └───────────────┘ └──────────────────┘   │
//! │                              │                                 │
//! │                              ▼                                 │
//! │                       ResourceAdapter                          │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```ignore
//! use keystone_txn::{Propagation, TransactionDefinition, TransactionManager};
//!
//! let tm = TransactionManager::new(adapter);
//!
//! // Begin a transaction
//! let mut outer = tm.begin(&TransactionDefinition::new())?;
//!
//! // Nest a unit of work that can fail on its own
//! let mut inner = tm.begin(&TransactionDefinition::with_propagation(Propagation::Nested))?;
//! tm.rollback(&mut inner)?;
//!
//! // Commit
//! tm.commit(&mut outer)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Resource adapter contract.
pub mod adapter;

/// Transaction definitions: propagation, isolation, timeout and read-only hints.
pub mod definition;

/// Transaction lifecycle management.
///
/// This module provides:
/// - [`manager::TransactionManager`]: Main coordinator for transactions
/// - [`manager::TransactionStats`]: Lifecycle counters
pub mod manager;

/// Savepoint tokens and the nested-transaction sub-protocol.
pub mod savepoint;

/// Per-attempt transaction status and lifecycle states.
pub mod status;

/// Closure-based transaction demarcation.
pub mod template;

/// Recording resource adapter for tests.
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types

pub use adapter::ResourceAdapter;

pub use definition::{IsolationLevel, Propagation, TransactionDefinition};

pub use manager::{TransactionManager, TransactionStats};

pub use savepoint::SavepointToken;

pub use status::{TransactionState, TransactionStatus};

pub use template::TransactionTemplate;

pub use keystone_common::config::TransactionManagerConfig;
pub use keystone_common::error::{ErrorCode, TransactionError, TxResult};
