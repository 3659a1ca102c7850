//! Savepoint sub-protocol.
//!
//! Nested transactions are emulated by layering a savepoint on top of the
//! existing transaction:
//!
//! ```text
//!   begin(NESTED)         commit(status)             rollback(status)
//!        │                     │                           │
//!        ▼                     ▼                           ▼
//! create_savepoint ──▶ release_savepoint      rollback_to_savepoint
//!   (token held)        (token dropped)          (token dropped,
//!                                                 outer untouched)
//! ```
//!
//! The adapter owns the rollback point; the driver only holds the token in
//! the status and guarantees that `has_savepoint()` turns false as soon as
//! the token has been handed back for release or rollback.

use std::fmt;

use keystone_common::error::{TransactionError, TxResult};
use keystone_common::types::SavepointId;

use crate::adapter::ResourceAdapter;
use crate::status::TransactionStatus;

/// Opaque token naming one rollback point.
///
/// Tokens compare by value. Generated tokens never repeat within a process,
/// so a token from one attempt cannot be mistaken for another's.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SavepointToken {
    id: SavepointId,
}

impl SavepointToken {
    /// Wraps an adapter-chosen identifier.
    pub fn new(id: SavepointId) -> Self {
        Self { id }
    }

    /// Creates a token with a freshly generated identifier.
    pub fn generate() -> Self {
        Self::new(SavepointId::generate())
    }

    /// Returns the identifier.
    pub fn id(&self) -> SavepointId {
        self.id
    }

    /// Returns the SQL savepoint name for this token.
    pub fn sql_name(&self) -> String {
        self.id.sql_name()
    }
}

impl fmt::Debug for SavepointToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SavepointToken({})", self.id)
    }
}

/// Creates a savepoint on the status's transaction and holds its token.
pub(crate) fn create_and_hold<A: ResourceAdapter>(
    adapter: &A,
    status: &mut TransactionStatus<A>,
) -> TxResult<()> {
    let transaction = status.transaction().ok_or_else(|| {
        TransactionError::nested_not_supported(
            "cannot create savepoint - no transaction associated with status",
        )
    })?;
    let token = adapter.create_savepoint(transaction)?;
    tracing::debug!("Created savepoint {:?}", token);
    status.hold_savepoint(token);
    Ok(())
}

/// Releases the held savepoint, completing the nested scope.
pub(crate) fn release_held<A: ResourceAdapter>(
    adapter: &A,
    status: &mut TransactionStatus<A>,
) -> TxResult<()> {
    let token = status.take_savepoint().ok_or_else(|| {
        TransactionError::usage(
            "cannot release savepoint - no savepoint associated with current transaction",
        )
    })?;
    let transaction = held_transaction(status)?;
    tracing::debug!("Releasing transaction savepoint {:?}", token);
    adapter.release_savepoint(transaction, &token)
}

/// Rolls back to the held savepoint. The enclosing transaction stays open.
pub(crate) fn rollback_to_held<A: ResourceAdapter>(
    adapter: &A,
    status: &mut TransactionStatus<A>,
) -> TxResult<()> {
    let token = status.take_savepoint().ok_or_else(|| {
        TransactionError::usage(
            "cannot roll back to savepoint - no savepoint associated with current transaction",
        )
    })?;
    let transaction = held_transaction(status)?;
    tracing::debug!("Rolling back transaction to savepoint {:?}", token);
    adapter.rollback_to_savepoint(transaction, &token)
}

fn held_transaction<A: ResourceAdapter>(status: &TransactionStatus<A>) -> TxResult<&A::Transaction> {
    status
        .transaction()
        .ok_or_else(|| TransactionError::usage("savepoint held without a transaction"))
}
