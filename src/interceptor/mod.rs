mod layer;

pub use layer::{InterceptorLayer, InterceptorMiddleware};

use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// standard return type for Interceptors
pub type InterceptorResult = Result<Response, InterceptorError>;

/// A type-erased error for interceptors
pub type InterceptorError = Box<dyn std::error::Error + Send + Sync>;

/// Represents the next handler in the chain
pub struct Next {
    run: Box<
        dyn FnOnce(Request<Body>) -> Pin<Box<dyn Future<Output = InterceptorResult> + Send>>
            + Send,
    >,
}

impl Next {
    /// Create a new Next handler
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Request<Body>) -> Pin<Box<dyn Future<Output = InterceptorResult> + Send>>
            + Send
            + 'static,
    {
        Self { run: Box::new(f) }
    }

    /// Execute the next handler
    pub async fn run(self, request: Request<Body>) -> InterceptorResult {
        (self.run)(request).await
    }
}

/// The Interceptor trait
///
/// Interceptors can inspect/modify the request before it reaches the handler,
/// and inspect/modify the response after the handler returns.
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    async fn intercept(&self, request: Request<Body>, next: Next) -> InterceptorResult;
}

/// Ordered chain of interceptors, registered at startup and frozen into a
/// [`InterceptorLayer`] when the server is assembled.
#[derive(Default)]
pub struct InterceptorRegistry {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interceptor; registration order is execution order.
    pub fn add(&mut self, interceptor: Arc<dyn Interceptor>) -> &mut Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn into_layer(self) -> InterceptorLayer {
        InterceptorLayer::new(self.interceptors)
    }
}
