//! Identifier types for Keystone.
//!
//! Transaction handles and savepoint tokens are opaque to the driver, but
//! adapters need something cheap and comparable to tell them apart. These
//! newtypes wrap a `u64` so that a transaction identifier can never be
//! confused with a savepoint identifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide sequence for generated transaction identifiers.
static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide sequence for generated savepoint identifiers.
static NEXT_SAVEPOINT_ID: AtomicU64 = AtomicU64::new(1);

/// Transaction identifier - identifies one logical transaction attempt.
///
/// Adapters typically embed a `TxnId` in their transaction handle so that
/// the handle presented at commit time can be checked against the one issued
/// at begin time.
///
/// # Example
///
/// ```rust
/// use keystone_common::types::TxnId;
///
/// let txn = TxnId::new(1);
/// assert!(txn.is_valid());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TxnId(u64);

impl TxnId {
    /// Invalid transaction ID, used as a sentinel value.
    pub const INVALID: Self = Self(0);

    /// Minimum valid transaction ID.
    pub const MIN: Self = Self(1);

    /// Creates a new `TxnId` from a raw u64 value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Generates a fresh identifier, unique within this process.
    #[must_use]
    pub fn generate() -> Self {
        Self(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Checks if this is a valid transaction ID.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl fmt::Debug for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "TxnId(INVALID)")
        } else {
            write!(f, "TxnId({})", self.0)
        }
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TxnId {
    #[inline]
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl From<TxnId> for u64 {
    #[inline]
    fn from(id: TxnId) -> Self {
        id.0
    }
}

/// Savepoint identifier - identifies one rollback point inside a transaction.
///
/// Generated identifiers never repeat within a process, so a token from one
/// attempt cannot alias a token from another.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SavepointId(u64);

impl SavepointId {
    /// Invalid savepoint ID, used as a sentinel value.
    pub const INVALID: Self = Self(0);

    /// Creates a new `SavepointId` from a raw u64 value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Generates a fresh identifier, unique within this process.
    #[must_use]
    pub fn generate() -> Self {
        Self(NEXT_SAVEPOINT_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Checks if this is a valid savepoint ID.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }

    /// Returns the conventional SQL savepoint name for this identifier.
    #[must_use]
    pub fn sql_name(self) -> String {
        format!("SAVEPOINT_{}", self.0)
    }
}

impl fmt::Debug for SavepointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "SavepointId(INVALID)")
        } else {
            write!(f, "SavepointId({})", self.0)
        }
    }
}

impl fmt::Display for SavepointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SavepointId {
    #[inline]
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}
