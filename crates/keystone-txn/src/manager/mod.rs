//! Transaction manager for coordinating transaction lifecycle.
//!
//! The manager is the generic driver: it asks the resource adapter for a
//! handle, decides from the definition's propagation whether to begin,
//! join, nest or run empty, and later routes commit and rollback to the
//! adapter primitive matching the recorded status.
//!
//! # Propagation
//!
//! ```text
//! propagation     no existing transaction     existing transaction
//! ─────────────   ────────────────────────    ───────────────────────────
//! REQUIRED        begin                       join
//! SUPPORTS        empty                       join
//! MANDATORY       IllegalTransactionState     join
//! REQUIRES_NEW    begin                       suspend, begin
//! NOT_SUPPORTED   empty                       suspend, empty
//! NEVER           empty                       IllegalTransactionState
//! NESTED          begin                       savepoint
//! ```
//!
//! # Completion
//!
//! ```text
//!               commit()                         rollback()
//! rollback-only ──▶ rollback path
//! savepoint     ──▶ release_savepoint            rollback_to_savepoint
//! new           ──▶ do_commit                    do_rollback
//! participant   ──▶ no-op                        do_set_rollback_only
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;

use keystone_common::config::TransactionManagerConfig;
use keystone_common::error::{TransactionError, TxResult};
use tracing::{debug, error, warn};

use crate::adapter::ResourceAdapter;
use crate::definition::{IsolationLevel, Propagation, TransactionDefinition};
use crate::savepoint::{self, SavepointToken};
use crate::status::{TransactionState, TransactionStatus};
use crate::template::TransactionTemplate;

const ALREADY_COMPLETED: &str =
    "transaction is already completed - do not call commit or rollback more than once per transaction";

/// Statistics about the transaction manager.
#[derive(Debug, Default)]
pub struct TransactionStats {
    /// Physical transactions started.
    pub begun: AtomicU64,
    /// Attempts that joined an existing transaction.
    pub joined: AtomicU64,
    /// Attempts nested via savepoint.
    pub nested: AtomicU64,
    /// Attempts running without a physical transaction.
    pub empty: AtomicU64,
    /// Attempts completed by commit.
    pub committed: AtomicU64,
    /// Attempts completed by rollback.
    pub rolled_back: AtomicU64,
    /// Attempts whose completion failed with an unknown outcome.
    pub failed: AtomicU64,
    /// Commits that turned into rollbacks because of a rollback-only marker.
    pub unexpected_rollbacks: AtomicU64,
    /// Held savepoints released on commit.
    pub savepoints_released: AtomicU64,
    /// Held savepoints rolled back.
    pub savepoints_rolled_back: AtomicU64,
    /// Transactions suspended for an inner scope.
    pub suspended: AtomicU64,
}

impl TransactionStats {
    /// Creates new stats.
    pub fn new() -> Self {
        Self::default()
    }

    fn record_state(&self, state: TransactionState) {
        let counter = match state {
            TransactionState::Begun => &self.begun,
            TransactionState::Joined => &self.joined,
            TransactionState::Nested => &self.nested,
            TransactionState::Empty => &self.empty,
            TransactionState::Committed => &self.committed,
            TransactionState::RolledBack => &self.rolled_back,
            TransactionState::Unknown => &self.failed,
        };
        counter.fetch_add(1, AtomicOrdering::Relaxed);
    }
}

/// The transaction manager drives one resource adapter.
///
/// # Example
///
/// ```ignore
/// use keystone_txn::{Propagation, TransactionDefinition, TransactionManager};
///
/// let tm = TransactionManager::new(adapter);
///
/// let mut status = tm.begin(&TransactionDefinition::new())?;
/// // ... work against the resource ...
/// tm.commit(&mut status)?;
/// ```
pub struct TransactionManager<A: ResourceAdapter> {
    /// The resource adapter.
    adapter: A,
    /// Configuration.
    config: TransactionManagerConfig,
    /// Statistics.
    stats: TransactionStats,
}

impl<A: ResourceAdapter> TransactionManager<A> {
    /// Creates a transaction manager with the default configuration.
    pub fn new(adapter: A) -> Self {
        Self {
            adapter,
            config: TransactionManagerConfig::default(),
            stats: TransactionStats::new(),
        }
    }

    /// Creates a transaction manager with custom configuration.
    pub fn with_config(adapter: A, config: TransactionManagerConfig) -> TxResult<Self> {
        config.validate()?;
        Ok(Self {
            adapter,
            config,
            stats: TransactionStats::new(),
        })
    }

    /// Returns the resource adapter.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Returns the configuration.
    pub fn config(&self) -> &TransactionManagerConfig {
        &self.config
    }

    /// Returns statistics.
    pub fn stats(&self) -> &TransactionStats {
        &self.stats
    }

    /// Returns a template running closures under the given definition.
    pub fn template(&self, definition: TransactionDefinition) -> TransactionTemplate<'_, A> {
        TransactionTemplate::new(self, definition)
    }

    /// Runs `f` inside a transaction, committing on `Ok` and rolling back on `Err`.
    pub fn execute<F, T, E>(&self, definition: TransactionDefinition, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut TransactionStatus<A>) -> Result<T, E>,
        E: From<TransactionError>,
    {
        self.template(definition).execute(f)
    }

    // ==========================================================================
    // Begin
    // ==========================================================================

    /// Begins a transaction according to the definition's propagation.
    ///
    /// On failure no status is returned and, if an outer transaction had been
    /// suspended, it is resumed before the error is reported.
    pub fn begin(&self, definition: &TransactionDefinition) -> TxResult<TransactionStatus<A>> {
        let timeout = self.determine_timeout(definition)?;
        let transaction = self.adapter.do_get_transaction()?;

        if self.adapter.is_existing_transaction(&transaction)? {
            return self.handle_existing_transaction(definition, transaction, timeout);
        }

        let propagation = definition.propagation_behavior();
        if propagation == Propagation::Mandatory {
            return Err(TransactionError::illegal_state(
                "no existing transaction found for transaction marked with propagation 'mandatory'",
            ));
        }

        if propagation.creates_when_absent() {
            debug!(
                "Creating new transaction with name [{}]: {}",
                definition.transaction_name().unwrap_or(""),
                definition
            );
            self.adapter.do_begin(&transaction, definition)?;
            return Ok(self.prepare_status(definition, Some(transaction), true, timeout, None));
        }

        if definition.isolation() != IsolationLevel::Default {
            warn!(
                "Custom isolation level specified but no actual transaction initiated; \
                 isolation level will effectively be ignored: {}",
                definition
            );
        }
        Ok(self.prepare_status(definition, None, true, timeout, None))
    }

    fn handle_existing_transaction(
        &self,
        definition: &TransactionDefinition,
        transaction: A::Transaction,
        timeout: Option<Duration>,
    ) -> TxResult<TransactionStatus<A>> {
        match definition.propagation_behavior() {
            Propagation::Never => Err(TransactionError::illegal_state(
                "existing transaction found for transaction marked with propagation 'never'",
            )),
            Propagation::NotSupported => {
                debug!("Suspending current transaction");
                let suspended = self.suspend(&transaction)?;
                Ok(self.prepare_status(definition, None, false, timeout, Some(suspended)))
            }
            Propagation::RequiresNew => {
                debug!(
                    "Suspending current transaction, creating new transaction with name [{}]",
                    definition.transaction_name().unwrap_or("")
                );
                let suspended = self.suspend(&transaction)?;
                match self.adapter.do_begin(&transaction, definition) {
                    Ok(()) => Ok(self.prepare_status(
                        definition,
                        Some(transaction),
                        true,
                        timeout,
                        Some(suspended),
                    )),
                    Err(begin_err) => Err(self.resume_after_begin_failure(
                        &transaction,
                        suspended,
                        begin_err,
                    )),
                }
            }
            Propagation::Nested => self.begin_nested(definition, transaction, timeout),
            Propagation::Required | Propagation::Supports | Propagation::Mandatory => {
                if self.config.validate_existing_transaction {
                    self.validate_participation(definition, &transaction)?;
                }
                debug!("Participating in existing transaction");
                Ok(self.prepare_status(definition, Some(transaction), false, timeout, None))
            }
        }
    }

    fn begin_nested(
        &self,
        definition: &TransactionDefinition,
        transaction: A::Transaction,
        timeout: Option<Duration>,
    ) -> TxResult<TransactionStatus<A>> {
        if !self.config.nested_transaction_allowed {
            return Err(TransactionError::nested_not_supported(
                "transaction manager does not allow nested transactions - \
                 enable 'nested_transaction_allowed'",
            ));
        }
        debug!(
            "Creating nested transaction with name [{}]",
            definition.transaction_name().unwrap_or("")
        );

        if self.config.use_savepoint_for_nested {
            let mut status = TransactionStatus::new(Some(transaction), false)
                .describe(definition.transaction_name(), definition.is_read_only())
                .with_deadline(timeout);
            savepoint::create_and_hold(&self.adapter, &mut status)?;
            self.stats.record_state(status.state());
            Ok(status)
        } else {
            self.adapter.do_begin(&transaction, definition)?;
            Ok(self.prepare_status(definition, Some(transaction), true, timeout, None))
        }
    }

    fn prepare_status(
        &self,
        definition: &TransactionDefinition,
        transaction: Option<A::Transaction>,
        new_transaction: bool,
        timeout: Option<Duration>,
        suspended: Option<A::Suspended>,
    ) -> TransactionStatus<A> {
        let status = TransactionStatus::new(transaction, new_transaction)
            .describe(definition.transaction_name(), definition.is_read_only())
            .with_deadline(timeout)
            .with_suspended(suspended);
        self.stats.record_state(status.state());
        status
    }

    fn determine_timeout(&self, definition: &TransactionDefinition) -> TxResult<Option<Duration>> {
        let timeout = definition
            .timeout_duration()
            .or_else(|| self.config.default_timeout());
        match timeout {
            Some(timeout) if timeout.is_zero() => {
                Err(TransactionError::InvalidTimeout { timeout_secs: 0 })
            }
            other => Ok(other),
        }
    }

    fn validate_participation(
        &self,
        definition: &TransactionDefinition,
        transaction: &A::Transaction,
    ) -> TxResult<()> {
        let requested = definition.isolation();
        if requested != IsolationLevel::Default {
            let current = self.adapter.current_isolation_level(transaction);
            if current != Some(requested) {
                return Err(TransactionError::illegal_state(format!(
                    "participating transaction with definition [{}] specifies isolation level \
                     which is incompatible with existing transaction: {}",
                    definition,
                    current.map_or("(unknown)", |level| level.as_str())
                )));
            }
        }
        if !definition.is_read_only() && self.adapter.is_current_read_only(transaction) {
            return Err(TransactionError::illegal_state(format!(
                "participating transaction with definition [{}] is not marked as read-only \
                 but existing transaction is",
                definition
            )));
        }
        Ok(())
    }

    fn suspend(&self, transaction: &A::Transaction) -> TxResult<A::Suspended> {
        let suspended = self.adapter.do_suspend(transaction)?;
        self.stats.suspended.fetch_add(1, AtomicOrdering::Relaxed);
        Ok(suspended)
    }

    fn resume_after_begin_failure(
        &self,
        transaction: &A::Transaction,
        suspended: A::Suspended,
        begin_err: TransactionError,
    ) -> TransactionError {
        match self.adapter.do_resume(Some(transaction), suspended) {
            Ok(()) => begin_err,
            Err(resume_err) => {
                error!(
                    "Inner transaction begin failure overridden by outer transaction resume failure: {}",
                    begin_err
                );
                resume_err
            }
        }
    }

    // ==========================================================================
    // Completion
    // ==========================================================================

    /// Marks the attempt rollback-only. A later commit rolls back instead.
    pub fn set_rollback_only(&self, status: &mut TransactionStatus<A>) -> TxResult<()> {
        Self::ensure_active(status)?;
        debug!("Transactional code has requested rollback-only");
        status.set_rollback_only();
        Ok(())
    }

    /// Returns true if the attempt is locally marked rollback-only or the
    /// resource reports the transaction as rollback-only.
    pub fn is_rollback_only(&self, status: &TransactionStatus<A>) -> bool {
        status.is_rollback_only() || self.is_global_rollback_only(status)
    }

    /// Commits the attempt, or rolls it back if it was marked rollback-only.
    pub fn commit(&self, status: &mut TransactionStatus<A>) -> TxResult<()> {
        Self::ensure_active(status)?;

        if status.is_rollback_only() {
            debug!("Transactional code has requested rollback");
            return self.process_rollback(status, false);
        }

        if !self.config.commit_on_global_rollback_only && self.is_global_rollback_only(status) {
            debug!("Global transaction is marked as rollback-only but transactional code requested commit");
            return self.process_rollback(status, true);
        }

        self.process_commit(status)
    }

    /// Rolls back the attempt.
    pub fn rollback(&self, status: &mut TransactionStatus<A>) -> TxResult<()> {
        Self::ensure_active(status)?;
        self.process_rollback(status, false)
    }

    fn process_commit(&self, status: &mut TransactionStatus<A>) -> TxResult<()> {
        let (state, outcome) = match self.commit_resource(status) {
            Ok(()) => (TransactionState::Committed, Ok(())),
            Err(err @ TransactionError::UnexpectedRollback { .. }) => {
                self.stats
                    .unexpected_rollbacks
                    .fetch_add(1, AtomicOrdering::Relaxed);
                (TransactionState::RolledBack, Err(err))
            }
            Err(err) if self.config.rollback_on_commit_failure => {
                self.rollback_on_commit_failure(status, err)
            }
            Err(err) => (TransactionState::Unknown, Err(err)),
        };
        self.finish(status, state, outcome)
    }

    fn commit_resource(&self, status: &mut TransactionStatus<A>) -> TxResult<()> {
        let mut unexpected_rollback = false;

        if status.has_savepoint() {
            unexpected_rollback = self.is_global_rollback_only(status);
            savepoint::release_held(&self.adapter, status)?;
            self.stats
                .savepoints_released
                .fetch_add(1, AtomicOrdering::Relaxed);
        } else if status.is_new_transaction() {
            debug!("Initiating transaction commit");
            unexpected_rollback = self.is_global_rollback_only(status);
            self.adapter.do_commit(status)?;
        } else if self.config.fail_early_on_global_rollback_only {
            unexpected_rollback = self.is_global_rollback_only(status);
        }

        if unexpected_rollback {
            return Err(TransactionError::unexpected_rollback(
                "transaction silently rolled back because it has been marked as rollback-only",
            ));
        }
        Ok(())
    }

    fn rollback_on_commit_failure(
        &self,
        status: &TransactionStatus<A>,
        commit_err: TransactionError,
    ) -> (TransactionState, TxResult<()>) {
        let rollback = if status.is_new_transaction() {
            debug!("Initiating transaction rollback after commit failure");
            self.adapter.do_rollback(status)
        } else if status.has_transaction() && self.config.global_rollback_on_participation_failure {
            debug!("Marking existing transaction as rollback-only after commit failure");
            self.adapter.do_set_rollback_only(status)
        } else {
            Ok(())
        };

        match rollback {
            Ok(()) => (TransactionState::RolledBack, Err(commit_err)),
            Err(rollback_err) => {
                error!("Commit failure overridden by rollback failure: {}", commit_err);
                (
                    TransactionState::Unknown,
                    Err(TransactionError::commit_rollback_failed(commit_err, rollback_err)),
                )
            }
        }
    }

    fn process_rollback(&self, status: &mut TransactionStatus<A>, unexpected: bool) -> TxResult<()> {
        let (state, outcome) = match self.rollback_resource(status, unexpected) {
            Ok(()) => (TransactionState::RolledBack, Ok(())),
            Err(err @ TransactionError::UnexpectedRollback { .. }) => {
                self.stats
                    .unexpected_rollbacks
                    .fetch_add(1, AtomicOrdering::Relaxed);
                (TransactionState::RolledBack, Err(err))
            }
            Err(err) => (TransactionState::Unknown, Err(err)),
        };
        self.finish(status, state, outcome)
    }

    fn rollback_resource(&self, status: &mut TransactionStatus<A>, unexpected: bool) -> TxResult<()> {
        let mut unexpected_rollback = unexpected;

        if status.has_savepoint() {
            savepoint::rollback_to_held(&self.adapter, status)?;
            self.stats
                .savepoints_rolled_back
                .fetch_add(1, AtomicOrdering::Relaxed);
        } else if status.is_new_transaction() {
            debug!("Initiating transaction rollback");
            self.adapter.do_rollback(status)?;
        } else {
            if status.has_transaction() {
                if status.is_rollback_only() || self.config.global_rollback_on_participation_failure {
                    debug!("Participating transaction failed - marking existing transaction as rollback-only");
                    self.adapter.do_set_rollback_only(status)?;
                } else {
                    debug!("Participating transaction failed - letting transaction originator decide on rollback");
                }
            } else {
                debug!("Should roll back transaction but cannot - no transaction available");
            }
            if !self.config.fail_early_on_global_rollback_only {
                unexpected_rollback = false;
            }
        }

        if unexpected_rollback {
            return Err(TransactionError::unexpected_rollback(
                "transaction rolled back because it has been marked as rollback-only",
            ));
        }
        Ok(())
    }

    /// Marks the status completed, cleans up and resumes suspended resources.
    fn finish(
        &self,
        status: &mut TransactionStatus<A>,
        state: TransactionState,
        outcome: TxResult<()>,
    ) -> TxResult<()> {
        status.complete(state);
        self.stats.record_state(state);

        if status.is_new_transaction() {
            if let Some(transaction) = status.transaction() {
                self.adapter.do_cleanup_after_completion(transaction);
            }
        }

        if let Some(suspended) = status.take_suspended() {
            debug!("Resuming suspended transaction after completion of inner transaction");
            if let Err(resume_err) = self.adapter.do_resume(status.transaction(), suspended) {
                return match outcome {
                    Ok(()) => Err(resume_err),
                    Err(err) => {
                        error!("Failed to resume suspended transaction: {}", resume_err);
                        Err(err)
                    }
                };
            }
        }

        outcome
    }

    fn is_global_rollback_only(&self, status: &TransactionStatus<A>) -> bool {
        status
            .transaction()
            .is_some_and(|transaction| self.adapter.is_rollback_only(transaction))
    }

    fn ensure_active(status: &TransactionStatus<A>) -> TxResult<()> {
        if status.is_completed() {
            return Err(TransactionError::illegal_state(ALREADY_COMPLETED));
        }
        Ok(())
    }

    // ==========================================================================
    // Explicit Savepoints
    // ==========================================================================

    /// Creates a savepoint inside the attempt's transaction.
    pub fn create_savepoint(&self, status: &TransactionStatus<A>) -> TxResult<SavepointToken> {
        let transaction = self.savepoint_target(status)?;
        self.adapter.create_savepoint(transaction)
    }

    /// Rolls back to a savepoint created by [`create_savepoint`](Self::create_savepoint).
    pub fn rollback_to_savepoint(
        &self,
        status: &TransactionStatus<A>,
        savepoint: &SavepointToken,
    ) -> TxResult<()> {
        let transaction = self.savepoint_target(status)?;
        self.adapter.rollback_to_savepoint(transaction, savepoint)
    }

    /// Releases a savepoint created by [`create_savepoint`](Self::create_savepoint).
    pub fn release_savepoint(
        &self,
        status: &TransactionStatus<A>,
        savepoint: &SavepointToken,
    ) -> TxResult<()> {
        let transaction = self.savepoint_target(status)?;
        self.adapter.release_savepoint(transaction, savepoint)
    }

    fn savepoint_target<'s>(&self, status: &'s TransactionStatus<A>) -> TxResult<&'s A::Transaction> {
        Self::ensure_active(status)?;
        status.transaction().ok_or_else(|| {
            TransactionError::nested_not_supported(
                "savepoints require an active transaction - status has none",
            )
        })
    }
}

impl<A: ResourceAdapter> fmt::Debug for TransactionManager<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionManager")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordedTransaction, RecordingAdapter};
    use keystone_common::types::TxnId;

    fn create_manager(existing: bool, can_create: bool) -> TransactionManager<RecordingAdapter> {
        TransactionManager::new(RecordingAdapter::new(existing, can_create))
    }

    fn required() -> TransactionDefinition {
        TransactionDefinition::with_propagation(Propagation::Required)
    }

    #[test]
    fn test_transaction_lifecycle() {
        let tm = create_manager(false, true);

        let mut status = tm.begin(&required()).unwrap();
        assert!(status.is_new_transaction());
        assert_eq!(status.state(), TransactionState::Begun);

        tm.commit(&mut status).unwrap();
        assert_eq!(status.state(), TransactionState::Committed);

        let recording = tm.adapter().recording();
        assert!(recording.begin);
        assert!(recording.commit);
        assert!(!recording.rollback);
        assert_eq!(recording.begin_count, 1);
        assert!(recording.cleaned_up);
    }

    #[test]
    fn test_transaction_rollback() {
        let tm = create_manager(false, true);

        let mut status = tm.begin(&required()).unwrap();
        tm.rollback(&mut status).unwrap();

        assert_eq!(status.state(), TransactionState::RolledBack);
        let recording = tm.adapter().recording();
        assert!(recording.rollback);
        assert!(!recording.commit);
    }

    #[test]
    fn test_cannot_create_transaction() {
        let tm = create_manager(false, false);

        let result = tm.begin(&required());
        assert!(matches!(
            result,
            Err(TransactionError::CannotCreateTransaction { .. })
        ));
        assert!(!tm.adapter().recording().begin);
        assert_eq!(tm.stats().begun.load(AtomicOrdering::Relaxed), 0);
    }

    #[test]
    fn test_mandatory_without_existing() {
        let tm = create_manager(false, true);

        let result = tm.begin(&TransactionDefinition::with_propagation(Propagation::Mandatory));
        assert!(matches!(
            result,
            Err(TransactionError::IllegalTransactionState { .. })
        ));
        assert_eq!(tm.adapter().recording().begin_count, 0);
    }

    #[test]
    fn test_begin_without_existing_follows_propagation() {
        let all = [
            Propagation::Required,
            Propagation::Supports,
            Propagation::RequiresNew,
            Propagation::NotSupported,
            Propagation::Never,
            Propagation::Nested,
        ];
        for propagation in all {
            let tm = create_manager(false, true);

            let status = tm
                .begin(&TransactionDefinition::with_propagation(propagation))
                .unwrap();
            let creates = propagation.creates_when_absent();
            assert_eq!(status.is_new_transaction(), creates, "{}", propagation);
            assert_eq!(
                tm.adapter().recording().begin_count,
                usize::from(creates),
                "{}",
                propagation
            );
        }
    }

    #[test]
    fn test_join_existing() {
        let tm = create_manager(true, true);

        let mut status = tm.begin(&required()).unwrap();
        assert!(!status.is_new_transaction());
        assert_eq!(status.state(), TransactionState::Joined);

        tm.commit(&mut status).unwrap();
        let recording = tm.adapter().recording();
        assert!(!recording.begin);
        assert!(!recording.commit);
    }

    #[test]
    fn test_participant_rollback_marks_rollback_only() {
        let tm = create_manager(true, true);

        let mut status = tm.begin(&required()).unwrap();
        tm.rollback(&mut status).unwrap();

        let recording = tm.adapter().recording();
        assert!(recording.rollback_only);
        assert!(!recording.rollback);
    }

    #[test]
    fn test_participant_rollback_without_global_marker() {
        let config = TransactionManagerConfig::builder()
            .global_rollback_on_participation_failure(false)
            .build();
        let tm = TransactionManager::with_config(RecordingAdapter::new(true, true), config).unwrap();

        let mut status = tm.begin(&required()).unwrap();
        tm.rollback(&mut status).unwrap();
        assert!(!tm.adapter().recording().rollback_only);

        // A locally rollback-only participant still poisons the outer transaction
        let mut status = tm.begin(&required()).unwrap();
        tm.set_rollback_only(&mut status).unwrap();
        tm.commit(&mut status).unwrap();
        assert!(tm.adapter().recording().rollback_only);
    }

    #[test]
    fn test_nested_with_savepoint() {
        let tm = create_manager(true, true);

        let mut status = tm
            .begin(&TransactionDefinition::with_propagation(Propagation::Nested))
            .unwrap();
        assert!(status.has_savepoint());
        assert_eq!(status.state(), TransactionState::Nested);
        assert!(tm.adapter().has_savepoint());

        tm.commit(&mut status).unwrap();
        assert!(!status.has_savepoint());
        let recording = tm.adapter().recording();
        assert!(recording.savepoint_release);
        assert!(!recording.commit);
        assert!(!recording.begin);
    }

    #[test]
    fn test_nested_not_allowed() {
        let config = TransactionManagerConfig::builder()
            .nested_transaction_allowed(false)
            .build();
        let tm = TransactionManager::with_config(RecordingAdapter::new(true, true), config).unwrap();

        let result = tm.begin(&TransactionDefinition::with_propagation(Propagation::Nested));
        assert!(matches!(
            result,
            Err(TransactionError::NestedTransactionNotSupported { .. })
        ));
        assert!(!tm.adapter().recording().savepoint);
    }

    #[test]
    fn test_nested_without_savepoint_support() {
        let tm = TransactionManager::new(RecordingAdapter::new(true, true).without_savepoints());

        let result = tm.begin(&TransactionDefinition::with_propagation(Propagation::Nested));
        assert!(matches!(
            result,
            Err(TransactionError::NestedTransactionNotSupported { .. })
        ));
    }

    #[test]
    fn test_nested_begin_instead_of_savepoint() {
        let config = TransactionManagerConfig::builder()
            .use_savepoint_for_nested(false)
            .build();
        let tm = TransactionManager::with_config(RecordingAdapter::new(true, true), config).unwrap();

        let mut status = tm
            .begin(&TransactionDefinition::with_propagation(Propagation::Nested))
            .unwrap();
        assert!(status.is_new_transaction());
        assert!(!status.has_savepoint());

        tm.commit(&mut status).unwrap();
        let recording = tm.adapter().recording();
        assert!(recording.begin);
        assert!(recording.commit);
        assert!(!recording.savepoint);
    }

    #[test]
    fn test_double_commit() {
        let tm = create_manager(false, true);

        let mut status = tm.begin(&required()).unwrap();
        tm.commit(&mut status).unwrap();

        let result = tm.commit(&mut status);
        assert!(matches!(
            result,
            Err(TransactionError::IllegalTransactionState { .. })
        ));
        let result = tm.rollback(&mut status);
        assert!(matches!(
            result,
            Err(TransactionError::IllegalTransactionState { .. })
        ));
        assert!(tm.set_rollback_only(&mut status).is_err());
        assert_eq!(tm.adapter().recording().commit_count, 1);
    }

    #[test]
    fn test_rollback_only_overrides_commit() {
        let tm = create_manager(false, true);

        let mut status = tm.begin(&required()).unwrap();
        tm.set_rollback_only(&mut status).unwrap();
        assert!(tm.is_rollback_only(&status));

        tm.commit(&mut status).unwrap();
        assert_eq!(status.state(), TransactionState::RolledBack);
        let recording = tm.adapter().recording();
        assert!(recording.rollback);
        assert!(!recording.commit);
    }

    #[test]
    fn test_global_rollback_only_is_unexpected() {
        let tm = create_manager(false, true);

        let mut status = tm.begin(&required()).unwrap();
        tm.adapter().mark_rollback_only();

        let result = tm.commit(&mut status);
        assert!(matches!(
            result,
            Err(TransactionError::UnexpectedRollback { .. })
        ));
        assert_eq!(status.state(), TransactionState::RolledBack);
        let recording = tm.adapter().recording();
        assert!(recording.rollback);
        assert!(!recording.commit);
        assert_eq!(tm.stats().unexpected_rollbacks.load(AtomicOrdering::Relaxed), 1);
    }

    #[test]
    fn test_foreign_handle_is_rejected() {
        let tm = create_manager(false, true);

        let mut status =
            TransactionStatus::<RecordingAdapter>::new(Some(RecordedTransaction::new(TxnId::new(u64::MAX))), true);
        let result = tm.commit(&mut status);
        assert!(matches!(
            result,
            Err(TransactionError::InvalidArgument { .. })
        ));
        assert!(!tm.adapter().recording().commit);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let tm = create_manager(false, true);

        let result = tm.begin(&required().timeout(Duration::ZERO));
        assert!(matches!(
            result,
            Err(TransactionError::InvalidTimeout { .. })
        ));
        assert_eq!(tm.adapter().recording().begin_count, 0);
    }

    #[test]
    fn test_default_timeout_applies() {
        let config = TransactionManagerConfig::builder()
            .default_timeout(Duration::from_secs(30))
            .build();
        let tm = TransactionManager::with_config(RecordingAdapter::new(false, true), config).unwrap();

        let status = tm.begin(&required()).unwrap();
        assert!(status.deadline().is_some());
        assert!(status.time_to_live().unwrap() <= Duration::from_secs(30));
    }

    #[test]
    fn test_sub_second_default_timeout_accepted() {
        let config = TransactionManagerConfig::builder()
            .default_timeout(Duration::from_millis(500))
            .build();
        let tm = TransactionManager::with_config(RecordingAdapter::new(false, true), config).unwrap();

        let status = tm.begin(&required()).unwrap();
        let ttl = status.time_to_live().unwrap();
        assert!(ttl > Duration::from_millis(500) && ttl <= Duration::from_secs(1));
    }

    #[test]
    fn test_stats() {
        let tm = create_manager(false, true);

        let mut first = tm.begin(&required()).unwrap();
        tm.commit(&mut first).unwrap();
        let mut second = tm.begin(&required()).unwrap();
        tm.rollback(&mut second).unwrap();

        assert_eq!(tm.stats().begun.load(AtomicOrdering::Relaxed), 2);
        assert_eq!(tm.stats().committed.load(AtomicOrdering::Relaxed), 1);
        assert_eq!(tm.stats().rolled_back.load(AtomicOrdering::Relaxed), 1);
    }

    #[test]
    fn test_explicit_savepoints() {
        let tm = create_manager(false, true);

        let mut status = tm.begin(&required()).unwrap();
        let token = tm.create_savepoint(&status).unwrap();
        tm.rollback_to_savepoint(&status, &token).unwrap();
        tm.release_savepoint(&status, &token).unwrap();
        tm.commit(&mut status).unwrap();

        let recording = tm.adapter().recording();
        assert!(recording.savepoint_rollback);
        assert!(recording.savepoint_release);
        assert!(recording.commit);
    }

    #[test]
    fn test_explicit_savepoint_requires_transaction() {
        let tm = create_manager(false, true);

        let status = tm
            .begin(&TransactionDefinition::with_propagation(Propagation::Supports))
            .unwrap();
        assert!(matches!(
            tm.create_savepoint(&status),
            Err(TransactionError::NestedTransactionNotSupported { .. })
        ));
    }
}
