use crate::config::OrmProperties;
use crate::error::{PersistraError, Result};
use crate::factory::{
    DataSource, EntityManagerFactory, EntityManagerFactoryBuilder, FactoryDefinition,
    PersistenceUnitManager,
};
use crate::interceptor::InterceptorRegistry;
use crate::registry::BeanRegistry;
use crate::transactional::{OrmTransactionManager, TransactionManager};
use crate::vendor::{PersistenceVendor, VendorAdapter, builtin_vendor};
use crate::web::WebScopingConfiguration;
use std::sync::Arc;

/// Ordered list of base packages registered for entity auto-discovery.
///
/// Owned by the embedding application, not by the auto-configuration; the
/// auto-configuration only reads it.
pub struct EntityScanPackages {
    packages: Vec<String>,
}

impl EntityScanPackages {
    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    /// Register base packages, merging after any already registered.
    /// Registration order is preserved; duplicates are skipped.
    pub fn register<I, S>(registry: &BeanRegistry, packages: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut merged = registry
            .get::<EntityScanPackages>()
            .map(|existing| existing.packages.clone())
            .unwrap_or_default();
        for package in packages {
            let package = package.into();
            if !merged.contains(&package) {
                merged.push(package);
            }
        }
        registry.register(Arc::new(EntityScanPackages { packages: merged }));
    }
}

/// Assembles the persistence beans at startup.
///
/// Each operation is idempotent with "create if absent" semantics over a
/// [`BeanRegistry`]: beans the embedding application registered beforehand
/// win, and the auto-configuration silently yields to them. Construction
/// happens once, sequentially, in dependency order; everything produced is
/// immutable afterwards.
pub struct PersistenceAutoconfiguration {
    vendor: Arc<dyn PersistenceVendor>,
    data_source: Arc<dyn DataSource>,
    unit_manager: Option<Arc<dyn PersistenceUnitManager>>,
    properties: OrmProperties,
    web_application: bool,
}

impl std::fmt::Debug for PersistenceAutoconfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceAutoconfiguration")
            .field("unit_manager", &self.unit_manager.is_some())
            .field("properties", &self.properties)
            .field("web_application", &self.web_application)
            .finish_non_exhaustive()
    }
}

impl PersistenceAutoconfiguration {
    pub fn builder() -> PersistenceAutoconfigurationBuilder {
        PersistenceAutoconfigurationBuilder::new()
    }

    pub fn properties(&self) -> &OrmProperties {
        &self.properties
    }

    pub fn vendor(&self) -> &Arc<dyn PersistenceVendor> {
        &self.vendor
    }

    /// Run the ordered resolution pass: adapter → builder → factory →
    /// transaction manager. Pre-registered beans win at every step.
    pub fn apply(&self, registry: &BeanRegistry) -> Result<()> {
        let adapter = self.vendor_adapter(registry)?;
        let builder = self.entity_manager_factory_builder(registry, adapter)?;
        let factory = self.entity_manager_factory(registry, &builder)?;
        self.transaction_manager(registry, factory)?;
        Ok(())
    }

    /// Full pass including web request scoping. Returns whether the
    /// open-in-view interceptor was activated and appended to the chain.
    pub fn apply_web(
        &self,
        registry: &BeanRegistry,
        interceptors: &mut InterceptorRegistry,
    ) -> Result<bool> {
        self.apply(registry)?;
        let factory = registry.get::<EntityManagerFactory>()?;
        match WebScopingConfiguration::activate(
            &self.properties,
            self.web_application,
            registry,
            factory,
        ) {
            Some(web) => {
                web.add_interceptors(interceptors);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Vendor adapter carrying the four generic settings, copied verbatim
    /// from the bound properties. Absent optional settings stay absent.
    pub fn vendor_adapter(&self, registry: &BeanRegistry) -> Result<Arc<VendorAdapter>> {
        registry.provide_if_absent(|| {
            let mut adapter = self.vendor.create_vendor_adapter();
            adapter.set_show_sql(self.properties.show_sql);
            adapter.set_database(self.properties.database);
            adapter.set_database_platform(self.properties.database_platform.clone());
            adapter.set_generate_ddl(self.properties.generate_ddl);
            Ok(Arc::new(adapter))
        })
    }

    /// Factory builder over the adapter, properties, and optional unit
    /// manager, with the vendor's finalization hooks attached.
    pub fn entity_manager_factory_builder(
        &self,
        registry: &BeanRegistry,
        adapter: Arc<VendorAdapter>,
    ) -> Result<Arc<EntityManagerFactoryBuilder>> {
        registry.provide_if_absent(|| {
            let mut builder = EntityManagerFactoryBuilder::new(
                adapter,
                self.properties.clone(),
                self.unit_manager.clone(),
            );
            let vendor = self.vendor.clone();
            let vendor_callback = vendor.vendor_callback();
            builder.set_callback(Arc::new(move |definition: &mut FactoryDefinition| {
                if let Some(callback) = &vendor_callback {
                    callback(definition);
                }
                vendor.configure(definition);
            }));
            Ok(Arc::new(builder))
        })
    }

    /// The entity manager factory, registered as the primary candidate for
    /// its role.
    pub fn entity_manager_factory(
        &self,
        registry: &BeanRegistry,
        builder: &EntityManagerFactoryBuilder,
    ) -> Result<Arc<EntityManagerFactory>> {
        registry.provide_primary_if_absent(|| {
            let factory = builder
                .data_source(self.data_source.clone())
                .packages(self.packages_to_scan(registry))
                .properties(self.vendor.vendor_properties(&self.properties))
                .build();
            Ok(Arc::new(factory))
        })
    }

    /// Default transaction manager wrapping the factory.
    pub fn transaction_manager(
        &self,
        registry: &BeanRegistry,
        factory: Arc<EntityManagerFactory>,
    ) -> Result<Arc<dyn TransactionManager>> {
        registry.provide_if_absent(|| {
            Ok(Arc::new(OrmTransactionManager::new(factory)) as Arc<dyn TransactionManager>)
        })
    }

    /// Base packages registered for auto-discovery; empty when no package
    /// registration exists.
    pub fn packages_to_scan(&self, registry: &BeanRegistry) -> Vec<String> {
        registry
            .get::<EntityScanPackages>()
            .map(|packages| packages.packages().to_vec())
            .unwrap_or_default()
    }
}

/// Builder for [`PersistenceAutoconfiguration`].
///
/// The data source is the only required input; the vendor is derived from
/// the configured database kind when not supplied explicitly.
pub struct PersistenceAutoconfigurationBuilder {
    vendor: Option<Arc<dyn PersistenceVendor>>,
    data_source: Option<Arc<dyn DataSource>>,
    unit_manager: Option<Arc<dyn PersistenceUnitManager>>,
    properties: Option<OrmProperties>,
    web_application: bool,
}

impl Default for PersistenceAutoconfigurationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceAutoconfigurationBuilder {
    pub fn new() -> Self {
        Self {
            vendor: None,
            data_source: None,
            unit_manager: None,
            properties: None,
            web_application: false,
        }
    }

    pub fn vendor(mut self, vendor: Arc<dyn PersistenceVendor>) -> Self {
        self.vendor = Some(vendor);
        self
    }

    pub fn data_source(mut self, data_source: Arc<dyn DataSource>) -> Self {
        self.data_source = Some(data_source);
        self
    }

    pub fn persistence_unit_manager(
        mut self,
        unit_manager: Arc<dyn PersistenceUnitManager>,
    ) -> Self {
        self.unit_manager = Some(unit_manager);
        self
    }

    pub fn properties(mut self, properties: OrmProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn web_application(mut self, web_application: bool) -> Self {
        self.web_application = web_application;
        self
    }

    /// # Errors
    /// Fails fast when the data source is missing, or when no vendor is
    /// supplied and none can be derived from the configured database kind.
    pub fn build(self) -> Result<PersistenceAutoconfiguration> {
        let data_source = self
            .data_source
            .ok_or_else(|| PersistraError::MissingComponent {
                role: "data source".to_string(),
            })?;
        let properties = self.properties.unwrap_or_default();
        let vendor = match self.vendor {
            Some(vendor) => vendor,
            None => builtin_vendor(properties.database).ok_or_else(|| {
                PersistraError::MissingComponent {
                    role: "persistence vendor".to_string(),
                }
            })?,
        };
        tracing::info!(
            vendor = vendor.name(),
            web_application = self.web_application,
            "persistence auto-configuration assembled"
        );
        Ok(PersistenceAutoconfiguration {
            vendor,
            data_source,
            unit_manager: self.unit_manager,
            properties,
            web_application: self.web_application,
        })
    }
}
