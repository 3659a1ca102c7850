//! Configuration for Keystone.
//!
//! This module provides the knobs that tune how the transaction manager
//! reacts to participation failures, nesting and rollback-only markers.

mod manager;

pub use manager::{TransactionManagerConfig, TransactionManagerConfigBuilder};
