//! Resource adapter contract.
//!
//! The driver never touches a resource directly. Everything it needs is
//! expressed by [`ResourceAdapter`]: five required primitives, and optional
//! ones whose defaults either fail (participation, savepoints, suspension)
//! or do nothing (introspection, cleanup).
//!
//! Adapter methods take `&self`; adapters that keep mutable bookkeeping
//! serialize it internally.

use std::fmt;

use keystone_common::error::{TransactionError, TxResult};

use crate::definition::{IsolationLevel, TransactionDefinition};
use crate::savepoint::SavepointToken;
use crate::status::TransactionStatus;

/// The capability set a concrete resource must provide to be driven by
/// [`TransactionManager`](crate::TransactionManager).
///
/// Every call that receives a handle or status must present the handle
/// issued by [`do_get_transaction`](Self::do_get_transaction) for the same
/// attempt. Adapters are expected to reject a foreign handle with
/// [`TransactionError::InvalidArgument`] before mutating any state.
pub trait ResourceAdapter: Sized {
    /// Opaque handle for the current unit of work.
    type Transaction: fmt::Debug;

    /// Resources detached from a handle while a transaction is suspended.
    type Suspended: fmt::Debug;

    /// Returns a handle for the current unit of work. Must succeed even when
    /// no transaction is active.
    fn do_get_transaction(&self) -> TxResult<Self::Transaction>;

    /// Returns true if the handle refers to an already running transaction.
    fn is_existing_transaction(&self, transaction: &Self::Transaction) -> TxResult<bool>;

    /// Starts a new transaction on the handle, applying the definition's
    /// isolation, timeout and read-only hints.
    fn do_begin(
        &self,
        transaction: &Self::Transaction,
        definition: &TransactionDefinition,
    ) -> TxResult<()>;

    /// Commits the transaction held by the status.
    fn do_commit(&self, status: &TransactionStatus<Self>) -> TxResult<()>;

    /// Rolls back the transaction held by the status.
    fn do_rollback(&self, status: &TransactionStatus<Self>) -> TxResult<()>;

    /// Marks the transaction held by a participating status rollback-only.
    fn do_set_rollback_only(&self, _status: &TransactionStatus<Self>) -> TxResult<()> {
        Err(TransactionError::illegal_state(
            "participating in existing transactions is not supported - \
             adapters reporting existing transactions must implement do_set_rollback_only",
        ))
    }

    /// Returns true if the resource has been marked rollback-only, possibly
    /// by a participant.
    fn is_rollback_only(&self, _transaction: &Self::Transaction) -> bool {
        false
    }

    /// Creates a savepoint in the handle's transaction.
    fn create_savepoint(&self, _transaction: &Self::Transaction) -> TxResult<SavepointToken> {
        Err(TransactionError::nested_not_supported(
            "resource adapter does not support savepoints",
        ))
    }

    /// Undoes all work since the savepoint was created.
    fn rollback_to_savepoint(
        &self,
        _transaction: &Self::Transaction,
        _savepoint: &SavepointToken,
    ) -> TxResult<()> {
        Err(TransactionError::nested_not_supported(
            "resource adapter does not support savepoints",
        ))
    }

    /// Discards the savepoint without undoing work.
    fn release_savepoint(
        &self,
        _transaction: &Self::Transaction,
        _savepoint: &SavepointToken,
    ) -> TxResult<()> {
        Err(TransactionError::nested_not_supported(
            "resource adapter does not support savepoints",
        ))
    }

    /// Detaches the running transaction from the handle.
    fn do_suspend(&self, _transaction: &Self::Transaction) -> TxResult<Self::Suspended> {
        Err(TransactionError::suspension_not_supported(
            "resource adapter does not support transaction suspension",
        ))
    }

    /// Reattaches previously suspended resources.
    fn do_resume(
        &self,
        _transaction: Option<&Self::Transaction>,
        _suspended: Self::Suspended,
    ) -> TxResult<()> {
        Err(TransactionError::suspension_not_supported(
            "resource adapter does not support transaction suspension",
        ))
    }

    /// Isolation level of the running transaction, if known.
    fn current_isolation_level(&self, _transaction: &Self::Transaction) -> Option<IsolationLevel> {
        None
    }

    /// Returns true if the running transaction is read-only.
    fn is_current_read_only(&self, _transaction: &Self::Transaction) -> bool {
        false
    }

    /// Releases per-transaction resources once a new transaction completed.
    fn do_cleanup_after_completion(&self, _transaction: &Self::Transaction) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Adapter implementing only the required primitives.
    struct MinimalAdapter;

    impl ResourceAdapter for MinimalAdapter {
        type Transaction = ();
        type Suspended = ();

        fn do_get_transaction(&self) -> TxResult<()> {
            Ok(())
        }

        fn is_existing_transaction(&self, _transaction: &()) -> TxResult<bool> {
            Ok(false)
        }

        fn do_begin(&self, _transaction: &(), _definition: &TransactionDefinition) -> TxResult<()> {
            Ok(())
        }

        fn do_commit(&self, _status: &TransactionStatus<Self>) -> TxResult<()> {
            Ok(())
        }

        fn do_rollback(&self, _status: &TransactionStatus<Self>) -> TxResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_optional_primitives_fail_by_default() {
        let adapter = MinimalAdapter;
        let status = TransactionStatus::<MinimalAdapter>::new(Some(()), false);

        assert!(matches!(
            adapter.do_set_rollback_only(&status),
            Err(TransactionError::IllegalTransactionState { .. })
        ));
        assert!(matches!(
            adapter.create_savepoint(&()),
            Err(TransactionError::NestedTransactionNotSupported { .. })
        ));
        assert!(matches!(
            adapter.do_suspend(&()),
            Err(TransactionError::TransactionSuspensionNotSupported { .. })
        ));
        assert!(matches!(
            adapter.do_resume(None, ()),
            Err(TransactionError::TransactionSuspensionNotSupported { .. })
        ));
    }

    #[test]
    fn test_introspection_defaults() {
        let adapter = MinimalAdapter;
        assert!(!adapter.is_rollback_only(&()));
        assert_eq!(adapter.current_isolation_level(&()), None);
        assert!(!adapter.is_current_read_only(&()));
    }
}
