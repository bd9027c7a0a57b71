use crate::error::{PersistraError, Result};
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::Arc;

/// Thread-safe registry of startup-assembled beans, keyed by role type.
///
/// A role is any `'static` type, sized or not: concrete structs and
/// `dyn Trait` objects both work, so `registry.get::<dyn TransactionManager>()`
/// resolves the same way as `registry.get::<VendorAdapter>()`. At most one
/// bean exists per role; beans registered by the embedding application take
/// precedence over anything auto-configuration would construct (see
/// [`provide_if_absent`](BeanRegistry::provide_if_absent)).
#[derive(Clone, Default)]
pub struct BeanRegistry {
    beans: DashMap<TypeId, BeanEntry>,
}

#[derive(Clone)]
struct BeanEntry {
    // Concretely an `Arc<T>` for the role type `T`, erased so sized and
    // unsized roles share one map.
    instance: Arc<dyn Any + Send + Sync>,
    primary: bool,
}

impl BeanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bean under role `T`, replacing any previous holder.
    pub fn register<T>(&self, bean: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.insert(bean, false);
    }

    /// Register a bean and mark it the preferred candidate for its role.
    pub fn register_primary<T>(&self, bean: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.insert(bean, true);
    }

    fn insert<T>(&self, bean: Arc<T>, primary: bool)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let entry = BeanEntry {
            instance: Arc::new(bean),
            primary,
        };
        self.beans.insert(TypeId::of::<T>(), entry);
    }

    pub fn get<T>(&self) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let entry =
            self.beans
                .get(&TypeId::of::<T>())
                .ok_or_else(|| PersistraError::BeanNotFound {
                    type_name: std::any::type_name::<T>().to_string(),
                })?;
        // The stored value is an `Arc<Arc<T>>` behind `dyn Any`; unwrap one
        // layer and hand out a clone of the inner handle.
        let wrapper = entry.instance.clone().downcast::<Arc<T>>().map_err(|_| {
            PersistraError::DowncastFailed {
                type_name: std::any::type_name::<T>().to_string(),
            }
        })?;
        Ok(wrapper.as_ref().clone())
    }

    pub fn contains<T>(&self) -> bool
    where
        T: ?Sized + 'static,
    {
        self.beans.contains_key(&TypeId::of::<T>())
    }

    /// Whether the bean registered for role `T` carries the primary marker.
    pub fn is_primary<T>(&self) -> bool
    where
        T: ?Sized + 'static,
    {
        self.beans
            .get(&TypeId::of::<T>())
            .map(|entry| entry.primary)
            .unwrap_or(false)
    }

    /// Resolve role `T`, constructing and registering the bean only when the
    /// role is still vacant. A pre-registered bean is returned untouched;
    /// that precedence is the designed behavior, not a conflict.
    pub fn provide_if_absent<T, F>(&self, constructor: F) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
        F: FnOnce() -> Result<Arc<T>>,
    {
        self.provide(false, constructor)
    }

    /// Same as [`provide_if_absent`](Self::provide_if_absent), marking a
    /// newly constructed bean as the primary candidate for its role.
    pub fn provide_primary_if_absent<T, F>(&self, constructor: F) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
        F: FnOnce() -> Result<Arc<T>>,
    {
        self.provide(true, constructor)
    }

    fn provide<T, F>(&self, primary: bool, constructor: F) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
        F: FnOnce() -> Result<Arc<T>>,
    {
        if self.contains::<T>() {
            tracing::debug!(
                role = std::any::type_name::<T>(),
                "yielding to pre-registered bean"
            );
            return self.get::<T>();
        }
        let bean = constructor()?;
        self.insert(bean.clone(), primary);
        tracing::info!(role = std::any::type_name::<T>(), "registered bean");
        Ok(bean)
    }

    pub fn len(&self) -> usize {
        self.beans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beans.is_empty()
    }
}
