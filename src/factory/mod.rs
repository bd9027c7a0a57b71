use crate::config::OrmProperties;
use crate::error::{PersistraError, Result};
use crate::session::EntityManager;
use crate::vendor::VendorAdapter;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Opaque connection-providing resource.
///
/// The engine behind it is not this crate's business; the factory only needs
/// a stable handle it can hand to every unit of work.
pub trait DataSource: Send + Sync + 'static {
    /// Connection URL or DSN this source resolves to.
    fn url(&self) -> &str;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "datasource"
    }
}

/// Supplies the persistence unit a factory should be built from. Optional;
/// absent means "use the engine default unit".
pub trait PersistenceUnitManager: Send + Sync + 'static {
    fn persistence_unit_name(&self) -> &str;
}

/// Callback customizing a [`FactoryDefinition`] just before it is frozen
/// into an [`EntityManagerFactory`].
pub type FactoryCallback = Arc<dyn Fn(&mut FactoryDefinition) + Send + Sync>;

/// Mutable pre-finalization state of an entity manager factory.
///
/// Vendor callbacks see this; once `build` freezes it, nothing mutates it
/// again.
pub struct FactoryDefinition {
    data_source: Arc<dyn DataSource>,
    packages: Vec<String>,
    properties: HashMap<String, String>,
    adapter: Arc<VendorAdapter>,
    persistence_unit: Option<String>,
}

impl FactoryDefinition {
    pub fn data_source(&self) -> &Arc<dyn DataSource> {
        &self.data_source
    }

    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    pub fn adapter(&self) -> &Arc<VendorAdapter> {
        &self.adapter
    }

    pub fn persistence_unit(&self) -> Option<&str> {
        self.persistence_unit.as_deref()
    }

    pub fn add_package(&mut self, package: impl Into<String>) {
        self.packages.push(package.into());
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Explicit settings win over what a callback would put there.
    pub fn set_property_if_absent(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.entry(key.into()).or_insert_with(|| value.into());
    }

    pub fn set_persistence_unit(&mut self, name: impl Into<String>) {
        self.persistence_unit = Some(name.into());
    }
}

/// Assembles [`EntityManagerFactory`] instances from a vendor adapter, the
/// bound ORM properties, and an optional persistence-unit manager.
///
/// The builder itself is stateless aside from its held references; each
/// [`data_source`](Self::data_source) call starts an independent build.
pub struct EntityManagerFactoryBuilder {
    adapter: Arc<VendorAdapter>,
    properties: OrmProperties,
    unit_manager: Option<Arc<dyn PersistenceUnitManager>>,
    callback: Option<FactoryCallback>,
}

impl EntityManagerFactoryBuilder {
    pub fn new(
        adapter: Arc<VendorAdapter>,
        properties: OrmProperties,
        unit_manager: Option<Arc<dyn PersistenceUnitManager>>,
    ) -> Self {
        Self {
            adapter,
            properties,
            unit_manager,
            callback: None,
        }
    }

    /// Attach the callback run against every definition this builder
    /// produces, just before finalization.
    pub fn set_callback(&mut self, callback: FactoryCallback) {
        self.callback = Some(callback);
    }

    pub fn orm_properties(&self) -> &OrmProperties {
        &self.properties
    }

    /// Start a factory build against the given data source.
    pub fn data_source(&self, data_source: Arc<dyn DataSource>) -> FactoryBuild {
        FactoryBuild {
            definition: FactoryDefinition {
                data_source,
                packages: Vec::new(),
                properties: HashMap::new(),
                adapter: self.adapter.clone(),
                persistence_unit: self
                    .unit_manager
                    .as_ref()
                    .map(|manager| manager.persistence_unit_name().to_string()),
            },
            callback: self.callback.clone(),
        }
    }
}

/// One in-flight factory build.
pub struct FactoryBuild {
    definition: FactoryDefinition,
    callback: Option<FactoryCallback>,
}

impl FactoryBuild {
    /// Base packages scanned for persistent entity types.
    pub fn packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.definition.packages = packages.into_iter().map(Into::into).collect();
        self
    }

    /// Engine-native property overrides, merged over anything set so far.
    pub fn properties(mut self, properties: HashMap<String, String>) -> Self {
        self.definition.properties.extend(properties);
        self
    }

    pub fn build(mut self) -> EntityManagerFactory {
        if let Some(callback) = self.callback.take() {
            callback(&mut self.definition);
        }
        EntityManagerFactory::new(self.definition)
    }
}

/// The primary long-lived persistence handle.
///
/// Owned by the hosting process for its entire lifetime; everything
/// downstream borrows it. Immutable after construction apart from the
/// terminal [`close`](Self::close).
pub struct EntityManagerFactory {
    definition: FactoryDefinition,
    closed: AtomicBool,
}

impl EntityManagerFactory {
    fn new(definition: FactoryDefinition) -> Self {
        tracing::info!(
            engine = definition.adapter.engine(),
            data_source = definition.data_source.name(),
            packages = ?definition.packages,
            "entity manager factory initialized"
        );
        Self {
            definition,
            closed: AtomicBool::new(false),
        }
    }

    pub fn data_source(&self) -> &Arc<dyn DataSource> {
        self.definition.data_source()
    }

    pub fn vendor_adapter(&self) -> &Arc<VendorAdapter> {
        self.definition.adapter()
    }

    pub fn packages(&self) -> &[String] {
        self.definition.packages()
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        self.definition.properties()
    }

    pub fn persistence_unit(&self) -> Option<&str> {
        self.definition.persistence_unit()
    }

    /// Open a fresh unit of work against this factory's data source.
    ///
    /// # Errors
    /// Fails once the factory has been closed.
    pub fn create_entity_manager(&self) -> Result<EntityManager> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PersistraError::FactoryClosed);
        }
        Ok(EntityManager::new(self.definition.data_source.clone()))
    }

    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Marks the factory closed; subsequent unit-of-work creation fails.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::info!(
                engine = self.definition.adapter.engine(),
                "entity manager factory closed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Database;

    struct TestDataSource;

    impl DataSource for TestDataSource {
        fn url(&self) -> &str {
            "memory://test"
        }
    }

    struct TestUnitManager;

    impl PersistenceUnitManager for TestUnitManager {
        fn persistence_unit_name(&self) -> &str {
            "accounts"
        }
    }

    fn adapter() -> Arc<VendorAdapter> {
        let mut adapter = VendorAdapter::new("postgresql");
        adapter.set_database(Database::PostgreSql);
        Arc::new(adapter)
    }

    #[test]
    fn build_threads_packages_and_properties_through() {
        let builder =
            EntityManagerFactoryBuilder::new(adapter(), OrmProperties::default(), None);
        let factory = builder
            .data_source(Arc::new(TestDataSource))
            .packages(["app::billing", "app::accounts"])
            .properties(HashMap::from([(
                "dialect".to_string(),
                "postgres".to_string(),
            )]))
            .build();

        assert_eq!(factory.packages(), ["app::billing", "app::accounts"]);
        assert_eq!(
            factory.properties().get("dialect").map(String::as_str),
            Some("postgres")
        );
        assert_eq!(factory.data_source().url(), "memory://test");
        assert_eq!(factory.persistence_unit(), None);
    }

    #[test]
    fn callback_runs_before_the_definition_freezes() {
        let mut builder =
            EntityManagerFactoryBuilder::new(adapter(), OrmProperties::default(), None);
        builder.set_callback(Arc::new(|definition: &mut FactoryDefinition| {
            definition.set_property_if_absent("schema.sync", "update");
        }));

        let factory = builder
            .data_source(Arc::new(TestDataSource))
            .build();
        assert_eq!(
            factory.properties().get("schema.sync").map(String::as_str),
            Some("update")
        );
    }

    #[test]
    fn callback_does_not_override_explicit_properties() {
        let mut builder =
            EntityManagerFactoryBuilder::new(adapter(), OrmProperties::default(), None);
        builder.set_callback(Arc::new(|definition: &mut FactoryDefinition| {
            definition.set_property_if_absent("schema.sync", "update");
        }));

        let factory = builder
            .data_source(Arc::new(TestDataSource))
            .properties(HashMap::from([(
                "schema.sync".to_string(),
                "off".to_string(),
            )]))
            .build();
        assert_eq!(
            factory.properties().get("schema.sync").map(String::as_str),
            Some("off")
        );
    }

    #[test]
    fn unit_manager_names_the_persistence_unit() {
        let builder = EntityManagerFactoryBuilder::new(
            adapter(),
            OrmProperties::default(),
            Some(Arc::new(TestUnitManager)),
        );
        let factory = builder.data_source(Arc::new(TestDataSource)).build();
        assert_eq!(factory.persistence_unit(), Some("accounts"));
    }

    #[test]
    fn closed_factory_refuses_new_units_of_work() {
        let builder =
            EntityManagerFactoryBuilder::new(adapter(), OrmProperties::default(), None);
        let factory = builder.data_source(Arc::new(TestDataSource)).build();

        assert!(factory.is_open());
        assert!(factory.create_entity_manager().is_ok());

        factory.close();
        factory.close(); // idempotent
        assert!(!factory.is_open());
        assert!(matches!(
            factory.create_entity_manager(),
            Err(PersistraError::FactoryClosed)
        ));
    }
}
