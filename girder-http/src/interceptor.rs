//! Interceptor chain composition.
//!
//! An interceptor wraps a handler: it sees the request on the way in and the
//! event stream on the way out, and may transform either, or answer without
//! delegating at all. A chain is a right-fold of the ordered interceptor
//! list around a terminal backend, so the first-registered interceptor is
//! outermost — first to see the request, last to observe the stream.

use std::sync::Arc;

use crate::event::HttpEventStream;
use crate::request::HttpRequest;

/// Anything that can turn a request into an event stream.
pub trait HttpHandler: Send + Sync {
    fn handle(&self, request: HttpRequest) -> HttpEventStream;
}

/// Marker for terminal handlers: they perform I/O instead of delegating.
pub trait HttpBackend: HttpHandler {}

/// A request/stream transformer sitting between the caller and a backend.
///
/// Delegation is explicit: call `next.handle(..)` to continue down the
/// chain, or return a stream of your own to answer in place. Failing before
/// delegation means downstream handlers never see the request.
pub trait HttpInterceptor: Send + Sync {
    fn intercept(&self, request: HttpRequest, next: Arc<dyn HttpHandler>) -> HttpEventStream;
}

/// One link of a built chain: an interceptor bound to its `next` handler.
pub struct HttpInterceptorHandler {
    interceptor: Arc<dyn HttpInterceptor>,
    next: Arc<dyn HttpHandler>,
}

impl HttpInterceptorHandler {
    pub fn new(interceptor: Arc<dyn HttpInterceptor>, next: Arc<dyn HttpHandler>) -> Self {
        Self { interceptor, next }
    }
}

impl HttpHandler for HttpInterceptorHandler {
    fn handle(&self, request: HttpRequest) -> HttpEventStream {
        self.interceptor.intercept(request, self.next.clone())
    }
}

/// Fold interceptors around a backend, preserving registration order
/// semantics: `interceptors[0]` handles the request first.
pub fn build_chain(
    interceptors: &[Arc<dyn HttpInterceptor>],
    backend: Arc<dyn HttpHandler>,
) -> Arc<dyn HttpHandler> {
    interceptors.iter().rev().fold(backend, |next, interceptor| {
        Arc::new(HttpInterceptorHandler::new(interceptor.clone(), next)) as Arc<dyn HttpHandler>
    })
}
