//! Transaction definitions.
//!
//! A [`TransactionDefinition`] is what a caller hands to
//! [`TransactionManager::begin`](crate::TransactionManager::begin): the
//! propagation behaviour deciding whether to join, create or nest, plus
//! hints (isolation, timeout, read-only) that the resource adapter applies
//! when it actually starts a transaction.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a transactional scope relates to a transaction that may already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Propagation {
    /// Join the existing transaction, or create one if none exists.
    #[default]
    Required,
    /// Join the existing transaction, or run without one.
    Supports,
    /// Join the existing transaction; fail if none exists.
    Mandatory,
    /// Always create a new transaction, suspending the existing one.
    RequiresNew,
    /// Run without a transaction, suspending the existing one.
    NotSupported,
    /// Run without a transaction; fail if one exists.
    Never,
    /// Nest inside the existing transaction (via savepoint), or create one.
    Nested,
}

impl Propagation {
    /// Returns the canonical name, e.g. `PROPAGATION_REQUIRES_NEW`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Propagation::Required => "PROPAGATION_REQUIRED",
            Propagation::Supports => "PROPAGATION_SUPPORTS",
            Propagation::Mandatory => "PROPAGATION_MANDATORY",
            Propagation::RequiresNew => "PROPAGATION_REQUIRES_NEW",
            Propagation::NotSupported => "PROPAGATION_NOT_SUPPORTED",
            Propagation::Never => "PROPAGATION_NEVER",
            Propagation::Nested => "PROPAGATION_NESTED",
        }
    }

    /// Returns true if this propagation starts a physical transaction when
    /// none exists.
    pub fn creates_when_absent(&self) -> bool {
        matches!(
            self,
            Propagation::Required | Propagation::RequiresNew | Propagation::Nested
        )
    }
}

impl fmt::Display for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IsolationLevel {
    /// Use the resource's default level.
    #[default]
    Default,
    /// Read uncommitted (lowest isolation).
    ReadUncommitted,
    /// Read committed.
    ReadCommitted,
    /// Repeatable read.
    RepeatableRead,
    /// Serializable (highest isolation).
    Serializable,
}

impl IsolationLevel {
    /// Returns the canonical name, e.g. `ISOLATION_SERIALIZABLE`.
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationLevel::Default => "ISOLATION_DEFAULT",
            IsolationLevel::ReadUncommitted => "ISOLATION_READ_UNCOMMITTED",
            IsolationLevel::ReadCommitted => "ISOLATION_READ_COMMITTED",
            IsolationLevel::RepeatableRead => "ISOLATION_REPEATABLE_READ",
            IsolationLevel::Serializable => "ISOLATION_SERIALIZABLE",
        }
    }

    /// Returns the SQL representation, or `None` for the resource default.
    pub fn as_sql(&self) -> Option<&'static str> {
        match self {
            IsolationLevel::Default => None,
            IsolationLevel::ReadUncommitted => Some("READ UNCOMMITTED"),
            IsolationLevel::ReadCommitted => Some("READ COMMITTED"),
            IsolationLevel::RepeatableRead => Some("REPEATABLE READ"),
            IsolationLevel::Serializable => Some("SERIALIZABLE"),
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Describes the transaction a caller wants.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use keystone_txn::{IsolationLevel, Propagation, TransactionDefinition};
///
/// let def = TransactionDefinition::new()
///     .propagation(Propagation::RequiresNew)
///     .isolation_level(IsolationLevel::Serializable)
///     .timeout(Duration::from_secs(30))
///     .read_only();
///
/// assert_eq!(
///     def.to_string(),
///     "PROPAGATION_REQUIRES_NEW,ISOLATION_SERIALIZABLE,timeout_30,readOnly"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionDefinition {
    propagation: Propagation,
    isolation_level: IsolationLevel,
    timeout: Option<Duration>,
    read_only: bool,
    name: Option<String>,
}

impl TransactionDefinition {
    /// Creates a definition with REQUIRED propagation and default isolation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a definition with the given propagation.
    pub fn with_propagation(propagation: Propagation) -> Self {
        Self::new().propagation(propagation)
    }

    /// Sets the propagation behaviour.
    pub fn propagation(mut self, propagation: Propagation) -> Self {
        self.propagation = propagation;
        self
    }

    /// Sets the isolation level.
    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = level;
        self
    }

    /// Sets the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Marks the transaction read-only.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Sets the transaction name, used in log output.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the propagation behaviour.
    pub fn propagation_behavior(&self) -> Propagation {
        self.propagation
    }

    /// Returns the isolation level.
    pub fn isolation(&self) -> IsolationLevel {
        self.isolation_level
    }

    /// Returns the timeout, if one was set.
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns true if the transaction is read-only.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns the transaction name, if one was set.
    pub fn transaction_name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Display for TransactionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.propagation, self.isolation_level)?;
        if let Some(timeout) = self.timeout {
            write!(f, ",timeout_{}", timeout.as_secs())?;
        }
        if self.read_only {
            f.write_str(",readOnly")?;
        }
        Ok(())
    }
}
