//! sea-orm backed data source and transaction plumbing.
//!
//! Enabled with the `sea-orm-db` feature. The rest of the crate stays
//! engine-agnostic; this module is the one place that talks to the engine
//! directly.

use crate::error::{PersistraError, Result};
use crate::factory::DataSource;
use crate::transactional::{Transaction, TransactionManager, TransactionOptions};
use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use std::any::Any;
use std::sync::Arc;

/// Data source over a sea-orm connection pool.
pub struct SeaOrmDataSource {
    url: String,
    connection: Arc<DatabaseConnection>,
}

impl SeaOrmDataSource {
    /// Connect to the database and wrap the pool as a data source.
    pub async fn connect(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let connection = sea_orm::Database::connect(&url).await?;
        tracing::info!("database connection pool established");
        Ok(Self {
            url,
            connection: Arc::new(connection),
        })
    }

    pub fn connection(&self) -> &Arc<DatabaseConnection> {
        &self.connection
    }
}

impl DataSource for SeaOrmDataSource {
    fn url(&self) -> &str {
        &self.url
    }

    fn name(&self) -> &str {
        "sea-orm"
    }
}

/// The engine transaction is stored inside an `Option` because sea-orm's
/// commit/rollback methods consume the transaction object.
pub struct SeaOrmTransaction {
    inner: Option<DatabaseTransaction>,
}

#[async_trait]
impl Transaction for SeaOrmTransaction {
    async fn commit(&mut self) -> Result<()> {
        if let Some(inner) = self.inner.take() {
            inner.commit().await.map_err(PersistraError::from)
        } else {
            // Committing twice indicates a logic error in the application.
            Err(PersistraError::Internal(
                "Attempted to commit a transaction that has already been finalized.".to_string(),
            ))
        }
    }

    async fn rollback(&mut self) -> Result<()> {
        if let Some(inner) = self.inner.take() {
            inner.rollback().await.map_err(PersistraError::from)
        } else {
            // An error path may roll back a transaction that was already
            // finalized; that is tolerated.
            Ok(())
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Transaction manager bound directly to an engine connection pool, for
/// applications that bypass the default factory-backed manager.
pub struct SeaOrmTransactionManager {
    connection: Arc<DatabaseConnection>,
}

impl SeaOrmTransactionManager {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl TransactionManager for SeaOrmTransactionManager {
    async fn begin(&self, options: TransactionOptions) -> Result<Box<dyn Transaction>> {
        tracing::debug!(
            isolation = ?options.isolation,
            read_only = options.read_only,
            "beginning engine transaction"
        );
        let inner = self.connection.begin().await?;
        Ok(Box::new(SeaOrmTransaction { inner: Some(inner) }))
    }
}
