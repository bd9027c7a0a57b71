use crate::interceptor::{Interceptor, InterceptorResult, Next};
use axum::{body::Body, http::Request, response::Response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer running a shared interceptor chain around the inner service.
pub struct InterceptorLayer {
    interceptors: Arc<Vec<Arc<dyn Interceptor>>>,
}

impl InterceptorLayer {
    pub fn new(interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        Self {
            interceptors: Arc::new(interceptors),
        }
    }
}

impl<S> Layer<S> for InterceptorLayer {
    type Service = InterceptorMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InterceptorMiddleware {
            inner,
            interceptors: self.interceptors.clone(),
        }
    }
}

#[derive(Clone)]
pub struct InterceptorMiddleware<S> {
    inner: S,
    interceptors: Arc<Vec<Arc<dyn Interceptor>>>,
}

impl<S> Service<Request<Body>> for InterceptorMiddleware<S>
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

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let interceptors = self.interceptors.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            // The innermost link calls the wrapped service; wrapping in
            // reverse makes interceptors[0] the outermost, so registration
            // order is execution order.
            let mut chain = Next::new(move |req: Request<Body>| {
                Box::pin(async move { inner.call(req).await.map_err(Into::into) })
                    as Pin<Box<dyn Future<Output = InterceptorResult> + Send>>
            });

            for interceptor in interceptors.iter().rev() {
                let interceptor = interceptor.clone();
                let next_chain = chain;
                chain = Next::new(move |req: Request<Body>| {
                    Box::pin(async move { interceptor.intercept(req, next_chain).await })
                });
            }

            chain.run(request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::convert::Infallible;
    use std::sync::Mutex;

    #[derive(Clone)]
    struct Echo;

    impl Service<Request<Body>> for Echo {
        type Response = Response;
        type Error = Infallible;
        type Future = std::future::Ready<Result<Response, Infallible>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _request: Request<Body>) -> Self::Future {
            std::future::ready(Ok(Response::new(Body::empty())))
        }
    }

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Interceptor for Recorder {
        async fn intercept(&self, request: Request<Body>, next: Next) -> InterceptorResult {
            self.log.lock().unwrap().push(format!("{}:before", self.name));
            let response = next.run(request).await?;
            self.log.lock().unwrap().push(format!("{}:after", self.name));
            Ok(response)
        }
    }

    #[tokio::test]
    async fn interceptors_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let layer = InterceptorLayer::new(vec![
            Arc::new(Recorder {
                name: "outer",
                log: log.clone(),
            }),
            Arc::new(Recorder {
                name: "inner",
                log: log.clone(),
            }),
        ]);

        let mut middleware = layer.layer(Echo);
        middleware
            .call(Request::new(Body::empty()))
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["outer:before", "inner:before", "inner:after", "outer:after"]
        );
    }
}
