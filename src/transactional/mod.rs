use crate::error::{PersistraError, Result};
use crate::factory::EntityManagerFactory;
use crate::session::EntityManager;
use async_trait::async_trait;
use std::sync::Arc;

/// Isolation levels for database transactions.
///
/// `None` in [`TransactionOptions`] defers to the engine default (commonly
/// read-committed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    /// May observe uncommitted writes from other transactions.
    ReadUncommitted,
    /// Only committed data is visible at the moment it is read.
    ReadCommitted,
    /// Repeated reads within the transaction see the same data.
    RepeatableRead,
    /// Equivalent to serial execution; highest consistency, lowest
    /// throughput.
    Serializable,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionOptions {
    pub isolation: Option<IsolationLevel>,
    pub read_only: bool,
}

/// Trait for managing transactions
#[async_trait]
pub trait TransactionManager: Send + Sync + 'static {
    /// Begin a new transaction with options
    async fn begin(&self, options: TransactionOptions) -> Result<Box<dyn Transaction>>;
}

/// A generic transaction abstraction
#[async_trait]
pub trait Transaction: Send + Sync + std::any::Any {
    /// Commit the transaction
    async fn commit(&mut self) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(&mut self) -> Result<()>;

    /// Gets this trait object as a mutable `Any` reference for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

/// Default transaction manager: one unit of work per transaction, opened
/// from the entity manager factory it wraps. Its lifetime is tied 1:1 to
/// that factory.
pub struct OrmTransactionManager {
    factory: Arc<EntityManagerFactory>,
}

impl OrmTransactionManager {
    pub fn new(factory: Arc<EntityManagerFactory>) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &Arc<EntityManagerFactory> {
        &self.factory
    }
}

#[async_trait]
impl TransactionManager for OrmTransactionManager {
    async fn begin(&self, options: TransactionOptions) -> Result<Box<dyn Transaction>> {
        let entity_manager = self.factory.create_entity_manager()?;
        tracing::debug!(
            unit_of_work = %entity_manager.id(),
            isolation = ?options.isolation,
            read_only = options.read_only,
            "beginning transaction"
        );
        Ok(Box::new(OrmTransaction {
            entity_manager: Some(entity_manager),
            options,
        }))
    }
}

/// Transaction over a single unit of work. The unit of work is held in an
/// `Option` because finalization consumes it.
pub struct OrmTransaction {
    entity_manager: Option<EntityManager>,
    options: TransactionOptions,
}

#[async_trait]
impl Transaction for OrmTransaction {
    async fn commit(&mut self) -> Result<()> {
        if let Some(mut entity_manager) = self.entity_manager.take() {
            tracing::debug!(unit_of_work = %entity_manager.id(), "committing transaction");
            if !self.options.read_only {
                entity_manager.flush()?;
            }
            entity_manager.close();
            Ok(())
        } else {
            // Committing twice indicates a logic error in the application.
            Err(PersistraError::Internal(
                "Attempted to commit a transaction that has already been finalized.".to_string(),
            ))
        }
    }

    async fn rollback(&mut self) -> Result<()> {
        // An error path may roll back a transaction that was already
        // finalized; that is tolerated.
        if let Some(mut entity_manager) = self.entity_manager.take() {
            tracing::debug!(unit_of_work = %entity_manager.id(), "rolling back transaction");
            entity_manager.close();
        }
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
