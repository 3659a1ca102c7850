//! Transaction manager configuration.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::{TransactionError, TxResult};

/// Transaction manager configuration.
///
/// # Example
///
/// ```rust
/// use keystone_common::config::TransactionManagerConfig;
///
/// let config = TransactionManagerConfig::default();
/// assert!(config.nested_transaction_allowed);
/// assert!(config.global_rollback_on_participation_failure);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionManagerConfig {
    /// Whether NESTED propagation is honoured at all.
    #[serde(default = "default_true")]
    pub nested_transaction_allowed: bool,

    /// Emulate nesting with savepoints. When false, a nested begin is issued
    /// to the adapter instead.
    #[serde(default = "default_true")]
    pub use_savepoint_for_nested: bool,

    /// Check isolation level and read-only flag of participants against the
    /// existing transaction.
    #[serde(default)]
    pub validate_existing_transaction: bool,

    /// A failed participant marks the outer transaction rollback-only.
    #[serde(default = "default_true")]
    pub global_rollback_on_participation_failure: bool,

    /// Raise an unexpected rollback as soon as a participant sees the outer
    /// transaction marked rollback-only.
    #[serde(default)]
    pub fail_early_on_global_rollback_only: bool,

    /// Roll back when the commit itself fails.
    #[serde(default)]
    pub rollback_on_commit_failure: bool,

    /// Commit even if the resource reports a global rollback-only marker.
    #[serde(default)]
    pub commit_on_global_rollback_only: bool,

    /// Timeout applied when a definition does not carry one.
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl Default for TransactionManagerConfig {
    fn default() -> Self {
        Self {
            nested_transaction_allowed: true,
            use_savepoint_for_nested: true,
            validate_existing_transaction: false,
            global_rollback_on_participation_failure: true,
            fail_early_on_global_rollback_only: false,
            rollback_on_commit_failure: false,
            commit_on_global_rollback_only: false,
            default_timeout_secs: None,
        }
    }
}

impl TransactionManagerConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Converts configuration to TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> TxResult<()> {
        if self.default_timeout_secs == Some(0) {
            return Err(TransactionError::InvalidConfig {
                message: "default_timeout_secs must be greater than zero".to_string(),
            });
        }

        if self.use_savepoint_for_nested && !self.nested_transaction_allowed {
            tracing::debug!("use_savepoint_for_nested has no effect while nesting is disallowed");
        }

        Ok(())
    }

    /// Returns the default timeout as a duration.
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_secs.map(Duration::from_secs)
    }

    /// Creates a builder for configuration.
    pub fn builder() -> TransactionManagerConfigBuilder {
        TransactionManagerConfigBuilder::new()
    }
}

/// Builder for transaction manager configuration.
#[derive(Default)]
pub struct TransactionManagerConfigBuilder {
    config: TransactionManagerConfig,
}

impl TransactionManagerConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows or forbids NESTED propagation.
    pub fn nested_transaction_allowed(mut self, allowed: bool) -> Self {
        self.config.nested_transaction_allowed = allowed;
        self
    }

    /// Chooses savepoints or nested begins for NESTED propagation.
    pub fn use_savepoint_for_nested(mut self, enabled: bool) -> Self {
        self.config.use_savepoint_for_nested = enabled;
        self
    }

    /// Enables validation of participants against the existing transaction.
    pub fn validate_existing_transaction(mut self, enabled: bool) -> Self {
        self.config.validate_existing_transaction = enabled;
        self
    }

    /// Sets whether failed participants poison the outer transaction.
    pub fn global_rollback_on_participation_failure(mut self, enabled: bool) -> Self {
        self.config.global_rollback_on_participation_failure = enabled;
        self
    }

    /// Sets whether participants fail early on a poisoned outer transaction.
    pub fn fail_early_on_global_rollback_only(mut self, enabled: bool) -> Self {
        self.config.fail_early_on_global_rollback_only = enabled;
        self
    }

    /// Sets whether a failed commit triggers a rollback.
    pub fn rollback_on_commit_failure(mut self, enabled: bool) -> Self {
        self.config.rollback_on_commit_failure = enabled;
        self
    }

    /// Sets whether to commit despite a global rollback-only marker.
    pub fn commit_on_global_rollback_only(mut self, enabled: bool) -> Self {
        self.config.commit_on_global_rollback_only = enabled;
        self
    }

    /// Sets the default timeout, rounded up to whole seconds.
    ///
    /// A non-zero timeout never rounds down to zero or to a shorter deadline.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        let secs = timeout
            .as_secs()
            .saturating_add(u64::from(timeout.subsec_nanos() > 0));
        self.config.default_timeout_secs = Some(secs);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> TransactionManagerConfig {
        self.config
    }
}
