//! # keystone-test
//!
//! Integration tests for Keystone.
//!
//! This crate contains:
//! - End-to-end lifecycle scenarios against the recording adapter
//! - Propagation behaviour checks
//! - Template and configuration tests
//!
//! The helpers below are shared by the files under `tests/`.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::Once;

use keystone_common::config::TransactionManagerConfig;
use keystone_txn::testing::RecordingAdapter;
use keystone_txn::{Propagation, TransactionDefinition, TransactionManager};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Installs a test subscriber once per process.
///
/// Output is controlled with `RUST_LOG`, defaulting to `keystone_txn=debug`.
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("keystone_txn=debug"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Creates a manager over a fresh recording adapter with default configuration.
pub fn manager(existing_transaction: bool, can_create_transaction: bool) -> TransactionManager<RecordingAdapter> {
    init_logging();
    TransactionManager::new(RecordingAdapter::new(
        existing_transaction,
        can_create_transaction,
    ))
}

/// Creates a manager over the given adapter and configuration.
pub fn manager_with(
    adapter: RecordingAdapter,
    config: TransactionManagerConfig,
) -> TransactionManager<RecordingAdapter> {
    init_logging();
    match TransactionManager::with_config(adapter, config) {
        Ok(tm) => tm,
        Err(e) => panic!("invalid test configuration: {}", e),
    }
}

/// Shorthand for a definition with the given propagation.
pub fn definition(propagation: Propagation) -> TransactionDefinition {
    TransactionDefinition::with_propagation(propagation).name(format!("test.{}", propagation))
}
