//! In-memory resource adapter that records every lifecycle callback.
//!
//! [`RecordingAdapter`] issues a single transaction handle and remembers
//! which primitives the driver invoked, so tests can assert on the exact
//! routing of begin, commit, rollback and savepoint calls.
//!
//! ```ignore
//! use keystone_txn::testing::RecordingAdapter;
//! use keystone_txn::{TransactionDefinition, TransactionManager};
//!
//! let tm = TransactionManager::new(RecordingAdapter::new(false, true));
//! let mut status = tm.begin(&TransactionDefinition::new()).unwrap();
//! tm.commit(&mut status).unwrap();
//!
//! let recording = tm.adapter().recording();
//! assert!(recording.begin && recording.commit && !recording.rollback);
//! ```

use keystone_common::error::{TransactionError, TxResult};
use keystone_common::types::TxnId;
use parking_lot::Mutex;

use crate::adapter::ResourceAdapter;
use crate::definition::{IsolationLevel, TransactionDefinition};
use crate::savepoint::SavepointToken;
use crate::status::TransactionStatus;

/// Handle issued by [`RecordingAdapter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTransaction {
    id: TxnId,
}

impl RecordedTransaction {
    /// Creates a handle with the given id.
    pub fn new(id: TxnId) -> Self {
        Self { id }
    }

    /// Returns the handle id.
    pub fn id(&self) -> TxnId {
        self.id
    }
}

/// State detached by [`RecordingAdapter::do_suspend`].
#[derive(Debug)]
pub struct RecordedSuspension {
    transaction: TxnId,
    was_active: bool,
    was_rollback_only: bool,
    savepoints: Vec<SavepointToken>,
}

impl RecordedSuspension {
    /// Returns the id of the suspended handle.
    pub fn transaction(&self) -> TxnId {
        self.transaction
    }
}

/// Which callbacks the adapter has seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recording {
    /// `do_begin` succeeded.
    pub begin: bool,
    /// `do_commit` succeeded.
    pub commit: bool,
    /// `do_rollback` succeeded.
    pub rollback: bool,
    /// `do_set_rollback_only` was called.
    pub rollback_only: bool,
    /// A savepoint was created.
    pub savepoint: bool,
    /// The last savepoint was released.
    pub savepoint_release: bool,
    /// A savepoint was rolled back to.
    pub savepoint_rollback: bool,
    /// A transaction was suspended.
    pub suspended: bool,
    /// A transaction was resumed.
    pub resumed: bool,
    /// Cleanup ran after completion.
    pub cleaned_up: bool,
    /// Number of successful `do_begin` calls.
    pub begin_count: usize,
    /// Number of successful `do_commit` calls.
    pub commit_count: usize,
    /// Number of successful `do_rollback` calls.
    pub rollback_count: usize,
}

#[derive(Debug, Default)]
struct AdapterState {
    recording: Recording,
    active: bool,
    rollback_only: bool,
    savepoints: Vec<SavepointToken>,
}

/// Fake resource adapter for tests.
#[derive(Debug)]
pub struct RecordingAdapter {
    handle: TxnId,
    can_create_transaction: bool,
    savepoints: bool,
    suspension: bool,
    current_isolation: Option<IsolationLevel>,
    read_only: bool,
    commit_failure: Option<String>,
    rollback_failure: Option<String>,
    resume_failure: Option<String>,
    state: Mutex<AdapterState>,
}

impl RecordingAdapter {
    /// Creates an adapter. With `existing_transaction` the handle already
    /// refers to a running transaction; without `can_create_transaction`
    /// every `do_begin` fails.
    pub fn new(existing_transaction: bool, can_create_transaction: bool) -> Self {
        Self {
            handle: TxnId::generate(),
            can_create_transaction,
            savepoints: true,
            suspension: true,
            current_isolation: None,
            read_only: false,
            commit_failure: None,
            rollback_failure: None,
            resume_failure: None,
            state: Mutex::new(AdapterState {
                active: existing_transaction,
                ..AdapterState::default()
            }),
        }
    }

    /// Disables savepoint support.
    pub fn without_savepoints(mut self) -> Self {
        self.savepoints = false;
        self
    }

    /// Disables suspend and resume.
    pub fn without_suspension(mut self) -> Self {
        self.suspension = false;
        self
    }

    /// Reports the running transaction as using `level`.
    pub fn with_current_isolation(mut self, level: IsolationLevel) -> Self {
        self.current_isolation = Some(level);
        self
    }

    /// Reports the running transaction as read-only.
    pub fn with_read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Makes every `do_commit` fail with a system error.
    pub fn fail_commit(mut self, message: impl Into<String>) -> Self {
        self.commit_failure = Some(message.into());
        self
    }

    /// Makes every `do_rollback` and `do_set_rollback_only` fail with a system error.
    pub fn fail_rollback(mut self, message: impl Into<String>) -> Self {
        self.rollback_failure = Some(message.into());
        self
    }

    /// Makes every `do_resume` fail with a system error.
    pub fn fail_resume(mut self, message: impl Into<String>) -> Self {
        self.resume_failure = Some(message.into());
        self
    }

    /// Returns a snapshot of the recorded callbacks.
    pub fn recording(&self) -> Recording {
        self.state.lock().recording.clone()
    }

    /// Returns true while an unreleased savepoint exists.
    pub fn has_savepoint(&self) -> bool {
        !self.state.lock().savepoints.is_empty()
    }

    /// Returns true while the handle refers to a running transaction.
    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Returns the handle this adapter issues.
    pub fn handle(&self) -> RecordedTransaction {
        RecordedTransaction::new(self.handle)
    }

    /// Marks the running transaction rollback-only, as another participant would.
    pub fn mark_rollback_only(&self) {
        self.state.lock().rollback_only = true;
    }

    fn check_handle(&self, transaction: &RecordedTransaction) -> TxResult<()> {
        if transaction.id != self.handle {
            return Err(TransactionError::invalid_argument(
                "Not the same transaction object",
            ));
        }
        Ok(())
    }

    fn check_status(&self, status: &TransactionStatus<Self>) -> TxResult<()> {
        let transaction = status
            .transaction()
            .ok_or_else(|| TransactionError::invalid_argument("No transaction object"))?;
        self.check_handle(transaction)
    }

    fn check_savepoints(&self) -> TxResult<()> {
        if !self.savepoints {
            return Err(TransactionError::nested_not_supported(
                "recording adapter configured without savepoints",
            ));
        }
        Ok(())
    }

    fn failure(message: &Option<String>) -> TxResult<()> {
        match message {
            Some(message) => Err(TransactionError::system(message.clone())),
            None => Ok(()),
        }
    }
}

impl ResourceAdapter for RecordingAdapter {
    type Transaction = RecordedTransaction;
    type Suspended = RecordedSuspension;

    fn do_get_transaction(&self) -> TxResult<RecordedTransaction> {
        Ok(self.handle())
    }

    fn is_existing_transaction(&self, transaction: &RecordedTransaction) -> TxResult<bool> {
        self.check_handle(transaction)?;
        Ok(self.state.lock().active)
    }

    fn do_begin(
        &self,
        transaction: &RecordedTransaction,
        _definition: &TransactionDefinition,
    ) -> TxResult<()> {
        self.check_handle(transaction)?;
        if !self.can_create_transaction {
            return Err(TransactionError::cannot_create("Cannot create transaction"));
        }
        let mut state = self.state.lock();
        state.active = true;
        state.rollback_only = false;
        state.savepoints.clear();
        state.recording.begin = true;
        state.recording.begin_count += 1;
        Ok(())
    }

    fn do_commit(&self, status: &TransactionStatus<Self>) -> TxResult<()> {
        self.check_status(status)?;
        Self::failure(&self.commit_failure)?;
        let mut state = self.state.lock();
        state.active = false;
        state.savepoints.clear();
        state.recording.commit = true;
        state.recording.commit_count += 1;
        Ok(())
    }

    fn do_rollback(&self, status: &TransactionStatus<Self>) -> TxResult<()> {
        self.check_status(status)?;
        Self::failure(&self.rollback_failure)?;
        let mut state = self.state.lock();
        state.active = false;
        state.rollback_only = false;
        state.savepoints.clear();
        state.recording.rollback = true;
        state.recording.rollback_count += 1;
        Ok(())
    }

    fn do_set_rollback_only(&self, status: &TransactionStatus<Self>) -> TxResult<()> {
        self.check_status(status)?;
        Self::failure(&self.rollback_failure)?;
        let mut state = self.state.lock();
        state.rollback_only = true;
        state.recording.rollback_only = true;
        Ok(())
    }

    fn is_rollback_only(&self, transaction: &RecordedTransaction) -> bool {
        transaction.id == self.handle && self.state.lock().rollback_only
    }

    fn create_savepoint(&self, transaction: &RecordedTransaction) -> TxResult<SavepointToken> {
        self.check_savepoints()?;
        self.check_handle(transaction)?;
        let token = SavepointToken::generate();
        let mut state = self.state.lock();
        state.savepoints.push(token.clone());
        state.recording.savepoint = true;
        state.recording.savepoint_release = false;
        state.recording.savepoint_rollback = false;
        Ok(token)
    }

    fn rollback_to_savepoint(
        &self,
        transaction: &RecordedTransaction,
        savepoint: &SavepointToken,
    ) -> TxResult<()> {
        self.check_savepoints()?;
        self.check_handle(transaction)?;
        let mut state = self.state.lock();
        if !state.savepoints.contains(savepoint) {
            return Err(TransactionError::usage(format!(
                "savepoint {:?} was not created by this transaction",
                savepoint
            )));
        }
        state.recording.savepoint_rollback = true;
        Ok(())
    }

    fn release_savepoint(
        &self,
        transaction: &RecordedTransaction,
        savepoint: &SavepointToken,
    ) -> TxResult<()> {
        self.check_savepoints()?;
        self.check_handle(transaction)?;
        let mut state = self.state.lock();
        let position = state
            .savepoints
            .iter()
            .position(|token| token == savepoint)
            .ok_or_else(|| {
                TransactionError::usage(format!(
                    "savepoint {:?} was not created by this transaction",
                    savepoint
                ))
            })?;
        state.savepoints.remove(position);
        state.recording.savepoint_release = true;
        Ok(())
    }

    fn do_suspend(&self, transaction: &RecordedTransaction) -> TxResult<RecordedSuspension> {
        if !self.suspension {
            return Err(TransactionError::suspension_not_supported(
                "recording adapter configured without suspension",
            ));
        }
        self.check_handle(transaction)?;
        let mut state = self.state.lock();
        let suspension = RecordedSuspension {
            transaction: self.handle,
            was_active: state.active,
            was_rollback_only: state.rollback_only,
            savepoints: std::mem::take(&mut state.savepoints),
        };
        state.active = false;
        state.rollback_only = false;
        state.recording.suspended = true;
        Ok(suspension)
    }

    fn do_resume(
        &self,
        transaction: Option<&RecordedTransaction>,
        suspended: RecordedSuspension,
    ) -> TxResult<()> {
        if let Some(transaction) = transaction {
            self.check_handle(transaction)?;
        }
        if suspended.transaction != self.handle {
            return Err(TransactionError::invalid_argument(
                "Not the same suspended transaction",
            ));
        }
        Self::failure(&self.resume_failure)?;
        let mut state = self.state.lock();
        state.active = suspended.was_active;
        state.rollback_only = suspended.was_rollback_only;
        state.savepoints = suspended.savepoints;
        state.recording.resumed = true;
        Ok(())
    }

    fn current_isolation_level(&self, _transaction: &RecordedTransaction) -> Option<IsolationLevel> {
        self.current_isolation
    }

    fn is_current_read_only(&self, _transaction: &RecordedTransaction) -> bool {
        self.read_only
    }

    fn do_cleanup_after_completion(&self, transaction: &RecordedTransaction) {
        if transaction.id == self.handle {
            self.state.lock().recording.cleaned_up = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_handle_rejected_before_mutation() {
        let adapter = RecordingAdapter::new(false, true);
        let foreign = RecordedTransaction::new(TxnId::new(u64::MAX));

        let result = adapter.do_begin(&foreign, &TransactionDefinition::new());
        assert!(matches!(
            result,
            Err(TransactionError::InvalidArgument { .. })
        ));
        assert_eq!(adapter.recording(), Recording::default());
        assert!(!adapter.is_active());
    }

    #[test]
    fn test_cannot_create() {
        let adapter = RecordingAdapter::new(false, false);
        let handle = adapter.do_get_transaction().unwrap();

        let result = adapter.do_begin(&handle, &TransactionDefinition::new());
        assert!(matches!(
            result,
            Err(TransactionError::CannotCreateTransaction { .. })
        ));
        assert_eq!(adapter.recording().begin_count, 0);
    }

    #[test]
    fn test_foreign_savepoint_rejected() {
        let adapter = RecordingAdapter::new(true, true);
        let handle = adapter.do_get_transaction().unwrap();

        adapter.create_savepoint(&handle).unwrap();
        let foreign = SavepointToken::generate();
        assert!(matches!(
            adapter.release_savepoint(&handle, &foreign),
            Err(TransactionError::TransactionUsage { .. })
        ));
        assert!(matches!(
            adapter.rollback_to_savepoint(&handle, &foreign),
            Err(TransactionError::TransactionUsage { .. })
        ));
        assert!(adapter.has_savepoint());
    }

    #[test]
    fn test_new_savepoint_resets_outcome_flags() {
        let adapter = RecordingAdapter::new(true, true);
        let handle = adapter.do_get_transaction().unwrap();

        let first = adapter.create_savepoint(&handle).unwrap();
        adapter.rollback_to_savepoint(&handle, &first).unwrap();
        adapter.release_savepoint(&handle, &first).unwrap();
        assert!(adapter.recording().savepoint_rollback);
        assert!(adapter.recording().savepoint_release);

        adapter.create_savepoint(&handle).unwrap();
        let recording = adapter.recording();
        assert!(!recording.savepoint_rollback);
        assert!(!recording.savepoint_release);
    }

    #[test]
    fn test_suspension_carries_savepoints() {
        let adapter = RecordingAdapter::new(true, true);
        let handle = adapter.do_get_transaction().unwrap();
        let token = adapter.create_savepoint(&handle).unwrap();

        let suspended = adapter.do_suspend(&handle).unwrap();
        assert!(!adapter.has_savepoint());

        adapter.do_resume(Some(&handle), suspended).unwrap();
        assert!(adapter.has_savepoint());
        adapter.release_savepoint(&handle, &token).unwrap();
    }

    #[test]
    fn test_suspend_and_resume() {
        let adapter = RecordingAdapter::new(true, true);
        let handle = adapter.do_get_transaction().unwrap();
        adapter.mark_rollback_only();

        let suspended = adapter.do_suspend(&handle).unwrap();
        assert_eq!(suspended.transaction(), handle.id());
        assert!(!adapter.is_existing_transaction(&handle).unwrap());
        assert!(!adapter.is_rollback_only(&handle));

        adapter.do_resume(Some(&handle), suspended).unwrap();
        assert!(adapter.is_existing_transaction(&handle).unwrap());
        assert!(adapter.is_rollback_only(&handle));

        let recording = adapter.recording();
        assert!(recording.suspended);
        assert!(recording.resumed);
    }
}
