//! # Persistra
//!
//! Conditional persistence auto-configuration for Rust web applications.
//!
//! Persistra assembles the persistence layer the way a container-managed
//! framework would (vendor adapter, entity manager factory, transaction
//! manager, open-in-view request scoping) but with explicit wiring: a
//! typed bean registry, constructor parameters threaded in dependency
//! order, and a closed set of vendor implementations. No reflection, no
//! annotation scanning.
//!
//! ## Features
//!
//! - **Create-if-absent wiring**: beans the application registers itself
//!   always win; auto-configuration silently yields to them
//! - **Vendor polymorphism**: one [`PersistenceVendor`](vendor::PersistenceVendor)
//!   implementation per supported engine supplies the engine-specific pieces
//! - **Open-in-view scoping**: a request-scoped unit of work, opened before
//!   the handler and released on every exit path
//! - **Typed configuration**: ORM properties bound once at startup, with
//!   fail-fast errors on malformed values
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use persistra::prelude::*;
//! use std::sync::Arc;
//!
//! struct AppDataSource;
//!
//! impl DataSource for AppDataSource {
//!     fn url(&self) -> &str {
//!         "postgres://localhost/app"
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> persistra::Result<()> {
//!     // 1. Bind the ORM properties from external configuration
//!     let config = ConfigService::new();
//!     config.set("orm.database", "postgresql");
//!     config.set("orm.show-sql", "true");
//!     let properties = OrmProperties::bind(&config)?;
//!
//!     // 2. Register what the application supplies itself
//!     let registry = BeanRegistry::new();
//!     EntityScanPackages::register(&registry, ["app::entities"]);
//!
//!     // 3. Assemble the persistence beans
//!     let autoconfiguration = PersistenceAutoconfiguration::builder()
//!         .data_source(Arc::new(AppDataSource))
//!         .properties(properties)
//!         .web_application(true)
//!         .build()?;
//!
//!     let mut interceptors = InterceptorRegistry::new();
//!     autoconfiguration.apply_web(&registry, &mut interceptors)?;
//!
//!     // 4. Retrieve beans by role and mount the request scoping
//!     let _factory = registry.get::<EntityManagerFactory>()?;
//!     let _transactions = registry.get::<dyn TransactionManager>()?;
//!     let _scoping = interceptors.into_layer();
//!     // Wrap your request-handling service with the layer...
//!     Ok(())
//! }
//! ```

pub mod autoconfigure;
pub mod config;
pub mod error;
pub mod factory;
pub mod interceptor;
#[cfg(feature = "sea-orm-db")]
pub mod orm;
pub mod registry;
pub mod session;
pub mod transactional;
pub mod vendor;
pub mod web;

// Re-export core types
pub use autoconfigure::{EntityScanPackages, PersistenceAutoconfiguration};
pub use config::{ConfigService, Database, OrmProperties};
pub use error::{PersistraError, Result};
pub use factory::{DataSource, EntityManagerFactory, EntityManagerFactoryBuilder};
pub use registry::BeanRegistry;
pub use transactional::{Transaction, TransactionManager};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use axum;

/// Prelude module for convenient imports
///
/// ```
/// use persistra::prelude::*;
/// ```
pub mod prelude {
    pub use crate::autoconfigure::{
        EntityScanPackages, PersistenceAutoconfiguration, PersistenceAutoconfigurationBuilder,
    };
    pub use crate::config::{ConfigService, Database, OrmProperties};
    pub use crate::error::{PersistraError, Result};
    pub use crate::factory::{
        DataSource, EntityManagerFactory, EntityManagerFactoryBuilder, FactoryBuild,
        FactoryCallback, FactoryDefinition, PersistenceUnitManager,
    };
    pub use crate::interceptor::{
        Interceptor, InterceptorLayer, InterceptorRegistry, InterceptorResult, Next,
    };
    pub use crate::registry::BeanRegistry;
    pub use crate::session::{ActiveEntityManager, EntityManager, current_entity_manager};
    pub use crate::transactional::{
        IsolationLevel, OrmTransactionManager, Transaction, TransactionManager, TransactionOptions,
    };
    pub use crate::vendor::{
        MySqlVendor, PersistenceVendor, PostgresVendor, SqliteVendor, VendorAdapter,
        builtin_vendor,
    };
    pub use crate::web::{
        OpenEntityManagerInViewFilter, OpenEntityManagerInViewInterceptor, WebScopingConfiguration,
    };
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
}
