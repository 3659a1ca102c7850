//! Per-attempt transaction status.
//!
//! # Transaction States
//!
//! ```text
//!                 ┌────────┐
//!            ┌───▶│ Begun  │───┐
//!            │    └────────┘   │
//!            │    ┌────────┐   │   commit()   ┌───────────┐
//! ┌───────┐  ├───▶│ Joined │───┼─────────────▶│ Committed │
//! │ Start │──┤    └────────┘   │              └───────────┘
//! └───────┘  │    ┌────────┐   │  rollback()  ┌────────────┐
//!    begin() ├───▶│ Nested │───┼─────────────▶│ RolledBack │
//!            │    └────────┘   │              └────────────┘
//!            │    ┌────────┐   │   failure    ┌─────────┐
//!            └───▶│ Empty  │───┴─────────────▶│ Unknown │
//!                 └────────┘                  └─────────┘
//! ```
//!
//! Terminal states accept no further transitions.

use std::fmt;
use std::time::{Duration, Instant};

use crate::adapter::ResourceAdapter;
use crate::savepoint::SavepointToken;

/// The lifecycle state of one transaction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// A new physical transaction was started.
    Begun,
    /// Participating in an existing transaction.
    Joined,
    /// Nested inside an existing transaction via a savepoint.
    Nested,
    /// Running without a physical transaction.
    Empty,
    /// Completed by commit.
    Committed,
    /// Completed by rollback.
    RolledBack,
    /// Completion failed and the outcome at the resource is unknown.
    Unknown,
}

impl TransactionState {
    /// Returns true if the attempt can still be completed.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TransactionState::Begun
                | TransactionState::Joined
                | TransactionState::Nested
                | TransactionState::Empty
        )
    }

    /// Returns true if the attempt has ended.
    pub fn is_ended(&self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionState::Begun => write!(f, "Begun"),
            TransactionState::Joined => write!(f, "Joined"),
            TransactionState::Nested => write!(f, "Nested"),
            TransactionState::Empty => write!(f, "Empty"),
            TransactionState::Committed => write!(f, "Committed"),
            TransactionState::RolledBack => write!(f, "RolledBack"),
            TransactionState::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Record of one transaction attempt, returned by
/// [`TransactionManager::begin`](crate::TransactionManager::begin).
///
/// Only the driver mutates a status; callers can flag it rollback-only via
/// [`TransactionManager::set_rollback_only`](crate::TransactionManager::set_rollback_only).
/// A status is never reused once completed.
pub struct TransactionStatus<A: ResourceAdapter> {
    /// Handle issued by the adapter; `None` for empty transactions.
    transaction: Option<A::Transaction>,
    /// Whether this attempt started the physical transaction.
    new_transaction: bool,
    /// Savepoint held for a nested scope.
    savepoint: Option<SavepointToken>,
    /// Sticky local rollback-only marker.
    rollback_only: bool,
    /// Current lifecycle state.
    state: TransactionState,
    /// Transaction name from the definition.
    name: Option<String>,
    /// Read-only flag from the definition.
    read_only: bool,
    /// Deadline derived from the timeout.
    deadline: Option<Instant>,
    /// Outer resources to restore on completion.
    suspended: Option<A::Suspended>,
    /// When the attempt started.
    started_at: Instant,
}

impl<A: ResourceAdapter> TransactionStatus<A> {
    /// Creates a status around a handle.
    ///
    /// The initial state is `Begun` for a new transaction, `Joined` for a
    /// participant holding a handle and `Empty` without a handle.
    pub fn new(transaction: Option<A::Transaction>, new_transaction: bool) -> Self {
        let state = match (&transaction, new_transaction) {
            (None, _) => TransactionState::Empty,
            (Some(_), true) => TransactionState::Begun,
            (Some(_), false) => TransactionState::Joined,
        };
        Self {
            transaction,
            new_transaction,
            savepoint: None,
            rollback_only: false,
            state,
            name: None,
            read_only: false,
            deadline: None,
            suspended: None,
            started_at: Instant::now(),
        }
    }

    /// Returns the transaction handle, if any.
    pub fn transaction(&self) -> Option<&A::Transaction> {
        self.transaction.as_ref()
    }

    /// Returns true if a physical transaction handle is held.
    pub fn has_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Returns true if this attempt started the physical transaction.
    ///
    /// Empty attempts never count as new, since there is nothing to commit.
    pub fn is_new_transaction(&self) -> bool {
        self.has_transaction() && self.new_transaction
    }

    /// Returns true while a savepoint is held.
    pub fn has_savepoint(&self) -> bool {
        self.savepoint.is_some()
    }

    /// Returns the held savepoint, if any.
    pub fn savepoint(&self) -> Option<&SavepointToken> {
        self.savepoint.as_ref()
    }

    /// Returns true if the attempt was locally marked rollback-only.
    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    /// Returns true once commit or rollback has run.
    pub fn is_completed(&self) -> bool {
        self.state.is_ended()
    }

    /// Returns the current state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns the transaction name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns true if the definition asked for a read-only transaction.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns the deadline, if a timeout applies.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the time left before the deadline.
    pub fn time_to_live(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns true if the deadline has passed.
    pub fn is_timed_out(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Returns true if outer resources were suspended for this attempt.
    pub fn has_suspended_resources(&self) -> bool {
        self.suspended.is_some()
    }

    /// Returns how long the attempt has been running.
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub(crate) fn describe(mut self, name: Option<&str>, read_only: bool) -> Self {
        self.name = name.map(str::to_owned);
        self.read_only = read_only;
        self
    }

    pub(crate) fn with_deadline(mut self, timeout: Option<Duration>) -> Self {
        self.deadline = timeout.map(|timeout| self.started_at + timeout);
        self
    }

    pub(crate) fn with_suspended(mut self, suspended: Option<A::Suspended>) -> Self {
        self.suspended = suspended;
        self
    }

    pub(crate) fn set_rollback_only(&mut self) {
        self.rollback_only = true;
    }

    pub(crate) fn hold_savepoint(&mut self, token: SavepointToken) {
        self.savepoint = Some(token);
        self.state = TransactionState::Nested;
    }

    pub(crate) fn take_savepoint(&mut self) -> Option<SavepointToken> {
        self.savepoint.take()
    }

    pub(crate) fn take_suspended(&mut self) -> Option<A::Suspended> {
        self.suspended.take()
    }

    pub(crate) fn complete(&mut self, state: TransactionState) {
        debug_assert!(state.is_ended());
        self.state = state;
    }
}

impl<A: ResourceAdapter> fmt::Debug for TransactionStatus<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionStatus")
            .field("transaction", &self.transaction)
            .field("state", &self.state)
            .field("new_transaction", &self.new_transaction)
            .field("savepoint", &self.savepoint)
            .field("rollback_only", &self.rollback_only)
            .field("suspended", &self.suspended.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordedTransaction, RecordingAdapter};
    use keystone_common::types::TxnId;

    type Status = TransactionStatus<RecordingAdapter>;

    fn handle() -> RecordedTransaction {
        RecordedTransaction::new(TxnId::new(1))
    }

    #[test]
    fn test_initial_states() {
        assert_eq!(Status::new(Some(handle()), true).state(), TransactionState::Begun);
        assert_eq!(Status::new(Some(handle()), false).state(), TransactionState::Joined);
        assert_eq!(Status::new(None, true).state(), TransactionState::Empty);
    }

    #[test]
    fn test_empty_status_is_never_new() {
        let status = Status::new(None, true);
        assert!(!status.has_transaction());
        assert!(!status.is_new_transaction());
    }

    #[test]
    fn test_rollback_only_is_sticky() {
        let mut status = Status::new(Some(handle()), true);
        assert!(!status.is_rollback_only());
        status.set_rollback_only();
        status.set_rollback_only();
        assert!(status.is_rollback_only());
    }

    #[test]
    fn test_savepoint_hold_and_take() {
        let mut status = Status::new(Some(handle()), false);
        let token = SavepointToken::generate();
        status.hold_savepoint(token.clone());
        assert!(status.has_savepoint());
        assert_eq!(status.state(), TransactionState::Nested);
        assert_eq!(status.take_savepoint(), Some(token));
        assert!(!status.has_savepoint());
    }

    #[test]
    fn test_deadline() {
        let status = Status::new(Some(handle()), true).with_deadline(Some(Duration::from_secs(60)));
        assert!(status.deadline().is_some());
        assert!(!status.is_timed_out());
        assert!(status.time_to_live().unwrap() <= Duration::from_secs(60));

        let expired = Status::new(Some(handle()), true).with_deadline(Some(Duration::ZERO));
        assert!(expired.is_timed_out());
        assert_eq!(expired.time_to_live(), Some(Duration::ZERO));

        let unbounded = Status::new(Some(handle()), true);
        assert_eq!(unbounded.time_to_live(), None);
        assert!(!unbounded.is_timed_out());
    }

    #[test]
    fn test_completion() {
        let mut status = Status::new(Some(handle()), true);
        assert!(!status.is_completed());
        status.complete(TransactionState::Committed);
        assert!(status.is_completed());
        assert_eq!(status.state(), TransactionState::Committed);
    }

    #[test]
    fn test_transaction_state_display() {
        assert_eq!(format!("{}", TransactionState::Begun), "Begun");
        assert_eq!(format!("{}", TransactionState::Committed), "Committed");
        assert_eq!(format!("{}", TransactionState::RolledBack), "RolledBack");
        assert!(TransactionState::Nested.is_active());
        assert!(TransactionState::Unknown.is_ended());
    }
}
