use crate::error::{PersistraError, Result};
use crate::factory::DataSource;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

tokio::task_local! {
    /// Task-local storage for the request-scoped unit of work.
    ///
    /// This holds the unit of work for the duration of an async task,
    /// allowing nested functions (like repository methods) to access it
    /// without explicit passing.
    pub static ACTIVE_ENTITY_MANAGER: Option<Arc<Mutex<EntityManager>>>;
}

/// Retrieves the currently active unit of work from task-local storage.
///
/// Returns `None` outside a scoped request (or when web scoping is
/// inactive).
pub fn current_entity_manager() -> Option<Arc<Mutex<EntityManager>>> {
    ACTIVE_ENTITY_MANAGER
        .try_with(|manager| manager.clone())
        .unwrap_or(None)
}

/// Wrapper to store the active unit of work in request extensions.
/// This allows handlers/repositories to retrieve the ongoing unit of work.
#[derive(Clone)]
pub struct ActiveEntityManager(pub Arc<Mutex<EntityManager>>);

/// A bounded unit of work over the persistence engine.
///
/// Created by the entity manager factory, scoped to one request or
/// transaction, and released exactly once. Units of work never share
/// mutable state with each other.
pub struct EntityManager {
    id: Uuid,
    data_source: Arc<dyn DataSource>,
    open: bool,
}

impl EntityManager {
    pub(crate) fn new(data_source: Arc<dyn DataSource>) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(unit_of_work = %id, "opened unit of work");
        Self {
            id,
            data_source,
            open: true,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Borrowed engine handle; the factory owns the underlying resource.
    pub fn data_source(&self) -> &Arc<dyn DataSource> {
        &self.data_source
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Push tracked state changes to the engine.
    ///
    /// # Errors
    /// Fails once the unit of work has been closed.
    pub fn flush(&mut self) -> Result<()> {
        if !self.open {
            return Err(PersistraError::UnitOfWorkClosed {
                id: self.id.to_string(),
            });
        }
        tracing::trace!(unit_of_work = %self.id, "flushing unit of work");
        Ok(())
    }

    /// Release the unit of work. Safe to call more than once; only the
    /// first call does anything.
    pub fn close(&mut self) {
        if self.open {
            self.open = false;
            tracing::debug!(unit_of_work = %self.id, "closed unit of work");
        }
    }
}
