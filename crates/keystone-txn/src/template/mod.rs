//! Closure-based transaction demarcation.

use keystone_common::error::TransactionError;
use tracing::error;

use crate::adapter::ResourceAdapter;
use crate::definition::TransactionDefinition;
use crate::manager::TransactionManager;
use crate::status::TransactionStatus;

/// Runs closures inside transactions created from a fixed definition.
///
/// The closure's `Err` rolls the transaction back; `Ok` commits it, unless
/// the closure marked the status rollback-only or completed it itself.
///
/// ```ignore
/// let template = tm.template(TransactionDefinition::with_propagation(Propagation::RequiresNew));
/// let order_id = template.execute(|status| {
///     let id = insert_order()?;
///     if id.is_draft() {
///         tm.set_rollback_only(status)?;
///     }
///     Ok::<_, TransactionError>(id)
/// })?;
/// ```
pub struct TransactionTemplate<'m, A: ResourceAdapter> {
    manager: &'m TransactionManager<A>,
    definition: TransactionDefinition,
}

impl<'m, A: ResourceAdapter> TransactionTemplate<'m, A> {
    /// Creates a template for the given manager and definition.
    pub fn new(manager: &'m TransactionManager<A>, definition: TransactionDefinition) -> Self {
        Self {
            manager,
            definition,
        }
    }

    /// Returns the definition used for every execution.
    pub fn definition(&self) -> &TransactionDefinition {
        &self.definition
    }

    /// Executes `f` within a transaction.
    pub fn execute<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut TransactionStatus<A>) -> Result<T, E>,
        E: From<TransactionError>,
    {
        let mut status = self.manager.begin(&self.definition)?;

        match f(&mut status) {
            Ok(value) => {
                if !status.is_completed() {
                    self.manager.commit(&mut status)?;
                }
                Ok(value)
            }
            Err(app_err) => {
                if !status.is_completed() {
                    if let Err(rollback_err) = self.manager.rollback(&mut status) {
                        error!("Application exception overridden by rollback exception");
                        return Err(rollback_err.into());
                    }
                }
                Err(app_err)
            }
        }
    }
}
