use crate::config::OrmProperties;
use crate::factory::EntityManagerFactory;
use crate::interceptor::{Interceptor, InterceptorRegistry, InterceptorResult, Next};
use crate::registry::BeanRegistry;
use crate::session::{ACTIVE_ENTITY_MANAGER, ActiveEntityManager};
use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::Mutex;
use tower::{Layer, Service};

/// Interceptor that keeps a unit of work open for the full duration of each
/// web request, including view rendering.
///
/// The unit of work is opened before the rest of the chain runs and released
/// on every exit path, error paths included. Handlers and repositories reach
/// it through request extensions ([`ActiveEntityManager`]) or
/// [`current_entity_manager`](crate::session::current_entity_manager).
pub struct OpenEntityManagerInViewInterceptor {
    factory: Arc<EntityManagerFactory>,
}

impl OpenEntityManagerInViewInterceptor {
    pub fn new(factory: Arc<EntityManagerFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl Interceptor for OpenEntityManagerInViewInterceptor {
    async fn intercept(&self, mut request: Request<Body>, next: Next) -> InterceptorResult {
        let entity_manager = self
            .factory
            .create_entity_manager()
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
        tracing::debug!(unit_of_work = %entity_manager.id(), "opening unit of work for request");

        // One reference goes into the request extensions for the handler,
        // one stays here to guarantee the release.
        let shared = Arc::new(Mutex::new(entity_manager));
        request
            .extensions_mut()
            .insert(ActiveEntityManager(shared.clone()));

        let result = ACTIVE_ENTITY_MANAGER
            .scope(Some(shared.clone()), next.run(request))
            .await;

        shared.lock().await.close();
        result
    }
}

/// Filter form of the open-in-view policy: a plain tower layer for services
/// that are not assembled through the interceptor chain.
#[derive(Clone)]
pub struct OpenEntityManagerInViewFilter {
    factory: Arc<EntityManagerFactory>,
}

impl OpenEntityManagerInViewFilter {
    pub fn new(factory: Arc<EntityManagerFactory>) -> Self {
        Self { factory }
    }
}

impl<S> Layer<S> for OpenEntityManagerInViewFilter {
    type Service = OpenEntityManagerInViewService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        OpenEntityManagerInViewService {
            inner,
            factory: self.factory.clone(),
        }
    }
}

#[derive(Clone)]
pub struct OpenEntityManagerInViewService<S> {
    inner: S,
    factory: Arc<EntityManagerFactory>,
}

impl<S> Service<Request<Body>> for OpenEntityManagerInViewService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<Box<dyn std::error::Error + Send + Sync>> + Send,
{
    type Response = Response;
    type Error = Box<dyn std::error::Error + Send + Sync>;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let factory = self.factory.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let entity_manager = factory
                .create_entity_manager()
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
            tracing::debug!(unit_of_work = %entity_manager.id(), "opening unit of work for request");

            let shared = Arc::new(Mutex::new(entity_manager));
            request
                .extensions_mut()
                .insert(ActiveEntityManager(shared.clone()));

            let result = ACTIVE_ENTITY_MANAGER
                .scope(Some(shared.clone()), inner.call(request))
                .await;

            shared.lock().await.close();
            result.map_err(Into::into)
        })
    }
}

/// Web request scoping for the persistence layer.
///
/// Activation is decided once at startup from a three-way conjunction: the
/// process serves web requests, no open-in-view interceptor or filter is
/// already registered, and the resolved open-in-view setting is true.
/// There is no way back to inactive after activation.
pub struct WebScopingConfiguration {
    interceptor: Arc<OpenEntityManagerInViewInterceptor>,
}

impl WebScopingConfiguration {
    /// Evaluate the activation predicate; on success the interceptor is
    /// constructed and registered exactly once.
    pub fn activate(
        properties: &OrmProperties,
        web_application: bool,
        registry: &BeanRegistry,
        factory: Arc<EntityManagerFactory>,
    ) -> Option<Self> {
        if !web_application {
            tracing::debug!("web scoping inactive: not a web application");
            return None;
        }
        if registry.contains::<OpenEntityManagerInViewInterceptor>()
            || registry.contains::<OpenEntityManagerInViewFilter>()
        {
            tracing::debug!("web scoping inactive: open-in-view already configured");
            return None;
        }
        if !properties.open_in_view_or_default() {
            tracing::debug!("web scoping inactive: open-in-view disabled");
            return None;
        }

        let interceptor = Arc::new(OpenEntityManagerInViewInterceptor::new(factory));
        registry.register(interceptor.clone());
        tracing::info!("open-in-view request scoping activated");
        Some(Self { interceptor })
    }

    pub fn open_entity_manager_in_view_interceptor(
        &self,
    ) -> Arc<OpenEntityManagerInViewInterceptor> {
        self.interceptor.clone()
    }

    /// Append the interceptor to the web framework's chain.
    pub fn add_interceptors(&self, registry: &mut InterceptorRegistry) {
        registry.add(self.interceptor.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{DataSource, EntityManagerFactoryBuilder};
    use crate::vendor::VendorAdapter;

    struct TestDataSource;

    impl DataSource for TestDataSource {
        fn url(&self) -> &str {
            "memory://test"
        }
    }

    fn factory() -> Arc<EntityManagerFactory> {
        let builder = EntityManagerFactoryBuilder::new(
            Arc::new(VendorAdapter::new("sqlite")),
            OrmProperties::default(),
            None,
        );
        Arc::new(builder.data_source(Arc::new(TestDataSource)).build())
    }

    #[test]
    fn inactive_outside_web_applications() {
        let registry = BeanRegistry::new();
        let props = OrmProperties::default();
        assert!(WebScopingConfiguration::activate(&props, false, &registry, factory()).is_none());
        assert!(!registry.contains::<OpenEntityManagerInViewInterceptor>());
    }

    #[test]
    fn inactive_when_open_in_view_is_disabled() {
        let registry = BeanRegistry::new();
        let props = OrmProperties {
            open_in_view: Some(false),
            ..Default::default()
        };
        assert!(WebScopingConfiguration::activate(&props, true, &registry, factory()).is_none());
    }

    #[test]
    fn inactive_when_a_filter_is_already_registered() {
        let registry = BeanRegistry::new();
        registry.register(Arc::new(OpenEntityManagerInViewFilter::new(factory())));

        let props = OrmProperties::default();
        assert!(WebScopingConfiguration::activate(&props, true, &registry, factory()).is_none());
    }

    #[test]
    fn active_registers_exactly_one_interceptor() {
        let registry = BeanRegistry::new();
        let props = OrmProperties::default();

        let web = WebScopingConfiguration::activate(&props, true, &registry, factory()).unwrap();
        assert!(registry.contains::<OpenEntityManagerInViewInterceptor>());

        let mut interceptors = InterceptorRegistry::new();
        web.add_interceptors(&mut interceptors);
        assert_eq!(interceptors.len(), 1);

        // A second activation sees the registered bean and yields.
        assert!(WebScopingConfiguration::activate(&props, true, &registry, factory()).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn unit_of_work_is_released_on_success() {
        let interceptor = OpenEntityManagerInViewInterceptor::new(factory());
        let observed: Arc<std::sync::Mutex<Option<ActiveEntityManager>>> =
            Arc::new(std::sync::Mutex::new(None));

        let observer = observed.clone();
        let next = Next::new(move |request: Request<Body>| {
            Box::pin(async move {
                let active = request
                    .extensions()
                    .get::<ActiveEntityManager>()
                    .cloned()
                    .expect("unit of work must be in request extensions");
                assert!(active.0.lock().await.is_open());
                *observer.lock().unwrap() = Some(active);
                Ok(Response::new(Body::empty()))
            }) as Pin<Box<dyn Future<Output = InterceptorResult> + Send>>
        });

        interceptor
            .intercept(Request::new(Body::empty()), next)
            .await
            .unwrap();

        let active = observed.lock().unwrap().clone().unwrap();
        assert!(!active.0.lock().await.is_open());
    }

    #[tokio::test]
    async fn unit_of_work_is_released_on_the_error_path() {
        let interceptor = OpenEntityManagerInViewInterceptor::new(factory());
        let observed: Arc<std::sync::Mutex<Option<ActiveEntityManager>>> =
            Arc::new(std::sync::Mutex::new(None));

        let observer = observed.clone();
        let next = Next::new(move |request: Request<Body>| {
            Box::pin(async move {
                let active = request
                    .extensions()
                    .get::<ActiveEntityManager>()
                    .cloned()
                    .expect("unit of work must be in request extensions");
                *observer.lock().unwrap() = Some(active);
                Err("handler exploded".into())
            }) as Pin<Box<dyn Future<Output = InterceptorResult> + Send>>
        });

        let result = interceptor
            .intercept(Request::new(Body::empty()), next)
            .await;
        assert!(result.is_err());

        let active = observed.lock().unwrap().clone().unwrap();
        assert!(!active.0.lock().await.is_open());
    }
}
